//! Subcommand implementations (`SPEC_FULL.md` §6).

mod cbor_json;
mod compress;
mod decompress;
mod frame_info;
mod train;

pub use cbor_json::{cmd_cbor_to_json, cmd_json_to_cbor};
pub use compress::cmd_compress;
pub use decompress::cmd_decompress;
pub use frame_info::cmd_frame_info;
pub use train::cmd_train;
