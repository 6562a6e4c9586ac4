//! Errors for host-side body state

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("{positions} positions but {velocities} velocities")]
    MismatchedBodies { positions: usize, velocities: usize },

    #[error("{0} bodies exceed the supported body count")]
    TooManyBodies(usize),

    #[error("projection buffer holds {actual} floats, {expected} needed")]
    ProjectionLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_counts() {
        let error = BodyError::MismatchedBodies {
            positions: 3,
            velocities: 2,
        };
        assert_eq!(error.to_string(), "3 positions but 2 velocities");

        let error = BodyError::ProjectionLength {
            expected: 8,
            actual: 3,
        };
        assert_eq!(error.to_string(), "projection buffer holds 3 floats, 8 needed");
    }
}
