//! Write and read barriers.
//!
//! Every managed field access runs through [`write`] or [`read`], which use the
//! field's [`WriteBarrier`] strategy to decide between the slot and the
//! attached authority:
//!
//! | strategy       | write                                       | read                                     |
//! |----------------|---------------------------------------------|------------------------------------------|
//! | `NoBarrier`    | slot                                        | slot                                     |
//! | `CheckWrite`   | authority if flags are set, else slot       | authority if load required and unloaded  |
//! | `MediateWrite` | authority if attached, else slot            | authority if attached and unloaded       |
//!
//! Direct writes on a detachable class record the field in the detached
//! tracker while the instance is detached. Delegated `CheckWrite` writes leave
//! the tracker alone; the authority owns that bookkeeping.

use keepsake_types::WriteBarrier;
use tracing::debug;

use crate::error::StateResult;
use crate::exchange;
use crate::instance::ManagedInstance;
use crate::value::FieldValue;

/// Write `value` to the field at absolute `index`.
pub fn write(instance: &mut ManagedInstance, index: usize, value: FieldValue) -> StateResult<()> {
    let (field_type, barrier) = instance.field_info(index)?;
    instance.check_type(index, field_type, &value)?;

    match barrier {
        WriteBarrier::NoBarrier => instance.set_slot(index, value),
        WriteBarrier::CheckWrite => {
            let delegate = instance
                .authority()
                .filter(|_| !instance.flags().is_clear())
                .cloned();
            match delegate {
                Some(authority) => {
                    debug!(
                        class = instance.class().name(),
                        field = index,
                        flags = %instance.flags(),
                        "delegating checked write"
                    );
                    let current = instance.slot(index).clone();
                    exchange::delegate_set(
                        authority.as_ref(),
                        instance,
                        index,
                        field_type,
                        current,
                        value,
                    );
                }
                None => {
                    instance.set_slot(index, value);
                    instance.record_detached_write(index);
                }
            }
        }
        WriteBarrier::MediateWrite => {
            match instance.authority().cloned() {
                Some(authority) => {
                    let current = read(instance, index)?;
                    exchange::delegate_set(
                        authority.as_ref(),
                        instance,
                        index,
                        field_type,
                        current,
                        value,
                    );
                }
                None => instance.set_slot(index, value),
            }
            // The authority may have released the instance during the write.
            instance.record_detached_write(index);
        }
    }
    Ok(())
}

/// Read the field at absolute `index`, loading it from the authority first
/// when the strategy requires it.
pub fn read(instance: &mut ManagedInstance, index: usize) -> StateResult<FieldValue> {
    let (field_type, barrier) = instance.field_info(index)?;

    let consult = match barrier {
        WriteBarrier::NoBarrier => false,
        WriteBarrier::CheckWrite => instance.flags().requires_load(),
        WriteBarrier::MediateWrite => true,
    };
    if consult {
        if let Some(authority) = instance.authority().cloned() {
            if !authority.is_loaded(instance, index) {
                let value = exchange::replacing(authority.as_ref(), instance, index, field_type);
                instance.set_slot(index, value);
            }
        }
    }
    Ok(instance.slot(index).clone())
}
