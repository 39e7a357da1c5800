//! The converter capability

use std::any::{Any, type_name};

use sluice_core::ConversionError;

/// One-way, stateless mapping from a foreign event shape to a canonical event
///
/// Absence maps to absence: `convert(None)` is `None`. Well-typed input never
/// fails. Only the type-erased entry point can fail, when the value handed in
/// is not the foreign shape this converter was paired with.
pub trait Converter: Send + Sync {
    type Foreign: 'static;
    type Canonical;

    fn convert(&self, foreign: Option<&Self::Foreign>) -> Option<Self::Canonical>;

    /// Convert a type-erased foreign event
    fn convert_any(
        &self,
        foreign: Option<&dyn Any>,
    ) -> Result<Option<Self::Canonical>, ConversionError> {
        let Some(value) = foreign else {
            return Ok(None);
        };
        value
            .downcast_ref::<Self::Foreign>()
            .map(|typed| self.convert(Some(typed)))
            .ok_or(ConversionError::UnexpectedType {
                expected: type_name::<Self::Foreign>(),
            })
    }
}
