#![warn(clippy::all, clippy::pedantic)]

// disable some style lints
#![allow(clippy::needless_return, clippy::must_use_candidate, clippy::comparison_chain)]
#![allow(clippy::redundant_field_names, clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unreadable_literal, clippy::range_plus_one, clippy::many_single_char_names)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::module_name_repetitions)]

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap, clippy::cast_lossless, clippy::cast_sign_loss)]

// Tests lints
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod types;
pub use types::*;

pub mod math;

mod errors;
pub use self::errors::Error;

pub mod locality;
pub use locality::{PeriodicBox, CellList, NearestNeighbors, NearestNeighborsParameters};

pub mod density;
pub use density::{CorrelationFunction, CorrelationParameters, FloatCF, ComplexCF};
pub use density::{Rdf, RdfParameters, LocalDensity, LocalDensityParameters};
