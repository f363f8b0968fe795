//! Typed dispatch onto the state authority's exchange triplets.
//!
//! Values reaching these functions have been checked against the field type,
//! so a scalar field always pairs with its scalar variant. Anything else falls
//! through to the object triplet.

use keepsake_types::FieldType;

use crate::authority::StateAuthority;
use crate::instance::ManagedInstance;
use crate::value::FieldValue;

pub(crate) fn delegate_set(
    authority: &dyn StateAuthority,
    instance: &mut ManagedInstance,
    field: usize,
    field_type: FieldType,
    current: FieldValue,
    new: FieldValue,
) {
    use FieldValue as V;
    match (field_type, current, new) {
        (FieldType::Boolean, V::Bool(c), V::Bool(n)) => {
            authority.set_boolean_field(instance, field, c, n)
        }
        (FieldType::Char, V::Char(c), V::Char(n)) => authority.set_char_field(instance, field, c, n),
        (FieldType::Byte, V::Byte(c), V::Byte(n)) => authority.set_byte_field(instance, field, c, n),
        (FieldType::Short, V::Short(c), V::Short(n)) => {
            authority.set_short_field(instance, field, c, n)
        }
        (FieldType::Int, V::Int(c), V::Int(n)) => authority.set_int_field(instance, field, c, n),
        (FieldType::Long, V::Long(c), V::Long(n)) => authority.set_long_field(instance, field, c, n),
        (FieldType::Float, V::Float(c), V::Float(n)) => {
            authority.set_float_field(instance, field, c, n)
        }
        (FieldType::Double, V::Double(c), V::Double(n)) => {
            authority.set_double_field(instance, field, c, n)
        }
        (FieldType::String, c, n) => {
            authority.set_string_field(instance, field, c.into_string(), n.into_string())
        }
        (_, c, n) => authority.set_object_field(instance, field, c, n),
    }
}

pub(crate) fn replacing(
    authority: &dyn StateAuthority,
    instance: &ManagedInstance,
    field: usize,
    field_type: FieldType,
) -> FieldValue {
    match field_type {
        FieldType::Boolean => FieldValue::Bool(authority.replacing_boolean_field(instance, field)),
        FieldType::Char => FieldValue::Char(authority.replacing_char_field(instance, field)),
        FieldType::Byte => FieldValue::Byte(authority.replacing_byte_field(instance, field)),
        FieldType::Short => FieldValue::Short(authority.replacing_short_field(instance, field)),
        FieldType::Int => FieldValue::Int(authority.replacing_int_field(instance, field)),
        FieldType::Long => FieldValue::Long(authority.replacing_long_field(instance, field)),
        FieldType::Float => FieldValue::Float(authority.replacing_float_field(instance, field)),
        FieldType::Double => FieldValue::Double(authority.replacing_double_field(instance, field)),
        FieldType::String => authority.replacing_string_field(instance, field).into(),
        FieldType::Object => authority.replacing_object_field(instance, field),
    }
}

pub(crate) fn provide(
    authority: &dyn StateAuthority,
    instance: &ManagedInstance,
    field: usize,
    field_type: FieldType,
    current: FieldValue,
) {
    use FieldValue as V;
    match (field_type, current) {
        (FieldType::Boolean, V::Bool(c)) => authority.provided_boolean_field(instance, field, c),
        (FieldType::Char, V::Char(c)) => authority.provided_char_field(instance, field, c),
        (FieldType::Byte, V::Byte(c)) => authority.provided_byte_field(instance, field, c),
        (FieldType::Short, V::Short(c)) => authority.provided_short_field(instance, field, c),
        (FieldType::Int, V::Int(c)) => authority.provided_int_field(instance, field, c),
        (FieldType::Long, V::Long(c)) => authority.provided_long_field(instance, field, c),
        (FieldType::Float, V::Float(c)) => authority.provided_float_field(instance, field, c),
        (FieldType::Double, V::Double(c)) => authority.provided_double_field(instance, field, c),
        (FieldType::String, c) => authority.provided_string_field(instance, field, c.into_string()),
        (_, c) => authority.provided_object_field(instance, field, c),
    }
}
