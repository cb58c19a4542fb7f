//! Per-operation request parameters.

use serde::{Deserialize, Serialize};

use crate::message::MessageName;

/// Triple encoding used by insert, update and remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
	/// RDF-M3 triple list.
	#[default]
	RdfM3,
	/// RDF/XML document.
	RdfXml,
}

/// Query language used by query and subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryType {
	/// RDF-M3 triple template.
	#[default]
	Template,
	/// Wilbur query language.
	Wql,
	/// SPARQL select.
	Sparql,
	/// RDF/XML template.
	RdfXml,
}

/// One caller-initiated operation with exactly the fields it needs.
///
/// Payload strings are owned so a queued task never borrows from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
	Join,
	Leave,
	Insert {
		encoding: Encoding,
		triples: String,
	},
	Update {
		encoding: Encoding,
		/// Triples inserted after the removal.
		insert: String,
		/// Triples removed first.
		remove: String,
	},
	Remove {
		encoding: Encoding,
		triples: String,
	},
	Query {
		query_type: QueryType,
		query: String,
	},
	Subscribe {
		query_type: QueryType,
		query: String,
	},
	Unsubscribe {
		subscription_id: String,
	},
}

impl Operation {
	/// Transaction name this operation is sent (and confirmed) under.
	pub fn name(&self) -> MessageName {
		match self {
			Operation::Join => MessageName::Join,
			Operation::Leave => MessageName::Leave,
			Operation::Insert { .. } => MessageName::Insert,
			Operation::Update { .. } => MessageName::Update,
			Operation::Remove { .. } => MessageName::Remove,
			Operation::Query { .. } => MessageName::Query,
			Operation::Subscribe { .. } => MessageName::Subscribe,
			Operation::Unsubscribe { .. } => MessageName::Unsubscribe,
		}
	}

	/// Total length of the owned payload strings, for logging.
	pub fn payload_len(&self) -> usize {
		match self {
			Operation::Join | Operation::Leave => 0,
			Operation::Insert { triples, .. } | Operation::Remove { triples, .. } => triples.len(),
			Operation::Update { insert, remove, .. } => insert.len() + remove.len(),
			Operation::Query { query, .. } | Operation::Subscribe { query, .. } => query.len(),
			Operation::Unsubscribe { subscription_id } => subscription_id.len(),
		}
	}
}

/// Borrowed view of everything the codec needs to build one request.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
	/// Identity of the target server.
	pub space_id: &'a str,
	/// Identity of the requesting node.
	pub node_id: &'a str,
	/// Caller-assigned message number.
	pub transaction_id: u32,
	pub operation: &'a Operation,
}
