//! Mutation batch sink.
//!
//! A batch is one JSON array of notifications. Each notification is
//! serialized into its own segment as it is queued (the first one carries
//! the opening bracket, later ones a leading comma), and [`MutationBatch::commit`]
//! closes the array and hands the segments over as a single [`Frame`].

use bytes::Bytes;
use keyhole_dom::{Key, Mutation, PatchSink};
use keyhole_rpc::{Frame, Notification};
use serde::Serialize;

use crate::error::{LiveError, Result};

/// Replace the text of a value node: `[key, text]`.
pub const SET_TEXT: &str = "kh.setText";
/// Set or remove an attribute: `[key, name, value | null]`.
pub const SET_ATTR: &str = "kh.setAttr";
/// Replace the content of a bracketed node: `[key, html, transition?]`.
pub const SET_ELEMENT: &str = "kh.setElement";
/// Insert a bracketed node after a sibling or group anchor: `[afterKey, html, transition?]`.
pub const ADD_ELEMENT: &str = "kh.addElement";
/// Remove a bracketed node: `[key, transition?]`.
pub const REMOVE_ELEMENT: &str = "kh.removeElement";

/// Accumulates mutations of one reconcile cycle.
#[derive(Debug, Default)]
pub struct MutationBatch {
	segments: Vec<Bytes>,
}

impl MutationBatch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of queued mutations.
	pub fn len(&self) -> usize {
		self.segments.len()
	}

	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	fn push_notification<P: Serialize>(&mut self, method: &str, params: P) -> Result<()> {
		let mut segment = Vec::with_capacity(96);
		segment.push(if self.segments.is_empty() { b'[' } else { b',' });
		serde_json::to_writer(&mut segment, &Notification::new(method, params))?;
		tracing::trace!(method, bytes = segment.len(), "live.batch.queued");
		self.segments.push(Bytes::from(segment));
		Ok(())
	}

	pub fn set_value(&mut self, key: &Key, text: &str) -> Result<()> {
		self.push_notification(SET_TEXT, (key.as_str(), text))
	}

	/// `value: None` removes the attribute.
	pub fn set_attribute(&mut self, key: &Key, name: &str, value: Option<&str>) -> Result<()> {
		self.push_notification(SET_ATTR, (key.as_str(), name, value))
	}

	pub fn replace_subtree(&mut self, key: &Key, html: &str, transition: Option<&str>) -> Result<()> {
		self.push_notification(SET_ELEMENT, with_transition(&[key.as_str(), html], transition))
	}

	pub fn insert_subtree(&mut self, after: &Key, html: &str, transition: Option<&str>) -> Result<()> {
		self.push_notification(ADD_ELEMENT, with_transition(&[after.as_str(), html], transition))
	}

	pub fn remove_subtree(&mut self, key: &Key, transition: Option<&str>) -> Result<()> {
		self.push_notification(REMOVE_ELEMENT, with_transition(&[key.as_str()], transition))
	}

	/// Queues the wire form of one diff mutation.
	pub fn apply(&mut self, mutation: &Mutation<'_>) -> Result<()> {
		match mutation {
			Mutation::ReplaceValue { key, slot } => {
				let mut text = String::new();
				slot.render_value(&mut text);
				self.set_value(key, &text)
			}
			Mutation::ReplaceAttribute { key, attribute } => {
				let name = attribute.attribute_name().unwrap_or_default();
				self.set_attribute(key, name, attribute.attribute_value().as_deref())
			}
			Mutation::ReplaceSubtree { key, fragment, transition } => self.replace_subtree(key, &fragment.inner_html(), *transition),
			Mutation::InsertSubtree {
				after,
				fragment,
				transition,
				..
			} => self.insert_subtree(after, &fragment.outer_html(), *transition),
			Mutation::RemoveSubtree { key, transition } => self.remove_subtree(key, *transition),
		}
	}

	/// Closes the batch into one frame. `None` when nothing was queued.
	pub fn commit(&mut self) -> Option<Frame> {
		if self.segments.is_empty() {
			return None;
		}
		let mut segments = std::mem::take(&mut self.segments);
		segments.push(Bytes::from_static(b"]"));
		Some(Frame::from_segments(segments))
	}
}

impl<'a> PatchSink<'a> for MutationBatch {
	type Error = LiveError;

	fn push(&mut self, mutation: Mutation<'a>) -> Result<()> {
		self.apply(&mutation)
	}
}

fn with_transition<'a>(head: &[&'a str], transition: Option<&'a str>) -> Vec<&'a str> {
	let mut params = head.to_vec();
	params.extend(transition);
	params
}
