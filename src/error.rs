use core::fmt::{self, Display};

use crate::{Entity, MAX_COMPONENTS};

/// The different kinds of errors which can occur
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The process-wide limit of [`MAX_COMPONENTS`] distinct component
    /// types is exhausted.
    ComponentCountExceeded,
    /// The entity did not have the requested component
    ComponentMissing(Entity, &'static str),
    /// The entity handle is stale or belongs to another universe
    NoSuchEntity(Entity),
    /// An instantiation with the same identifier is already registered
    DuplicateInstantiation(String),
    /// No instantiation is registered under the identifier
    UnknownInstantiation(String),
    /// The entity has no instantiation attached
    NoInstantiation(Entity),
}

/// Result alias for [crate::error::Error]
pub type Result<T> = core::result::Result<T, Error>;

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ComponentCountExceeded => write!(
                f,
                "Attempt to register more than {MAX_COMPONENTS} component types"
            ),
            Error::ComponentMissing(id, name) => {
                write!(f, "Entity {id} does not have the component {name}")
            }
            Error::NoSuchEntity(id) => write!(f, "Entity {id} does not exist"),
            Error::DuplicateInstantiation(ident) => {
                write!(f, "An instantiation named {ident:?} is already registered")
            }
            Error::UnknownInstantiation(ident) => {
                write!(f, "No instantiation named {ident:?} is registered")
            }
            Error::NoInstantiation(id) => {
                write!(f, "Entity {id} has no instantiation attached")
            }
        }
    }
}
