/// Resolution of live documents inside an opened project.
pub mod document;
/// Ephemeral editing sessions whose effect is reported as text edits.
pub mod sandbox;
