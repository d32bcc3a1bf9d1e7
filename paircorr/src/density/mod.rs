//! Statistics computed from pairs of points: pair histograms, correlation
//! functions, radial distribution functions and local densities.

mod histogram;
pub use self::histogram::{BinValue, PairHistogram};

mod correlation;
pub use self::correlation::{CorrelationFunction, CorrelationParameters, FloatCF, ComplexCF};

mod rdf;
pub use self::rdf::{Rdf, RdfParameters};

mod local_density;
pub use self::local_density::{LocalDensity, LocalDensityParameters};
