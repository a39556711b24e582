//! Conservative size bounds for dynamically-sized containers
//! (`spec.md` §4.J, §9 "TODO: better bound").
//!
//! Every Thrift-compact value takes at least one byte, so a container
//! claiming more elements than remain in the source cannot be genuine.
//! This rejects corrupt or adversarial length fields before any
//! allocation is sized from them.

use vex_core::error::{Error, ErrorCode, Result};

/// Reject `num_elements` if, at `min_elem_size` bytes per element, it
/// could not possibly fit in `remaining_bytes`.
pub fn check_container_bound(num_elements: usize, min_elem_size: usize, remaining_bytes: usize) -> Result<()> {
    let needed = num_elements
        .checked_mul(min_elem_size)
        .ok_or_else(|| Error::new(ErrorCode::NodeInvalidInput, "container element count overflows size bound"))?;
    if needed > remaining_bytes {
        tracing::warn!(num_elements, min_elem_size, remaining_bytes, "rejecting container, declared size exceeds remaining input");
        return Err(Error::new(
            ErrorCode::NodeInvalidInput,
            "container size exceeds the remaining source bytes",
        ));
    }
    Ok(())
}
