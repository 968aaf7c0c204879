// Library root
// -----------
// This crate exposes the core of the eimg CLI as a library so the
// binary stays thin and the logic stays testable.
//
// Module responsibilities:
// - `error`: the failure taxonomy every operation reports through.
// - `crypto`: passphrase key derivation and AEAD seal/open.
// - `config`: the on-disk configuration record and its permission
//   policy.
// - `vault`: encrypted API key storage built on `crypto` + `config`.
// - `api`: blocking HTTP client for the EPIC metadata and archive
//   endpoints.
// - `download`: the retrieval pipeline (date resolution, URL building,
//   safe streaming to disk).
// - `ui`: command handlers that wire prompts and output around the
//   core.
pub mod api;
pub mod config;
pub mod crypto;
pub mod download;
pub mod error;
pub mod ui;
pub mod vault;
