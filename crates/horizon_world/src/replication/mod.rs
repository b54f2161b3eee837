//! # Replication
//!
//! Turns entity field state into per-recipient wire blocks and back.
//!
//! - [`block`] - create, values, out-of-range and destroy builders
//! - [`UpdateData`] - everything queued for one recipient in one tick
//! - [`decode_packet`] / [`ObjectMirror`] - the receiving side
//!
//! A recipient must receive a create block before any values block for the same
//! entity. The map's visibility dispatch tracks which guids each player has a
//! baseline for and picks the path accordingly.

pub mod block;
mod buffer;
mod mirror;
mod packet;

pub use block::{
    build_create_update_block, build_destroy_block, build_out_of_range_block, build_values_update_block,
    recipient_flags, UpdateType,
};
pub use buffer::{ByteBuffer, ByteReader};
pub use mirror::{MirroredObject, ObjectMirror};
pub use packet::{decode_packet, DecodedUpdate, FieldUpdate, UpdateBlock, UpdateData};
