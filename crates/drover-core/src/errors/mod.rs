use std::error::Error;

/// Base trait for all application errors
pub trait DroverError: Error + Send + Sync + 'static {
    /// Error code for programmatic handling
    fn error_code(&self) -> &'static str;

    /// Whether this error should be logged as an error or warning
    fn is_user_error(&self) -> bool {
        false
    }
}

/// Common result type for the application
pub type DroverResult<T> = Result<T, Box<dyn DroverError>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drover_result() {
        let _result: DroverResult<i32> = Ok(42);
    }

    #[test]
    fn test_trait_is_object_safe() {
        #[derive(Debug)]
        struct Dummy;
        impl std::fmt::Display for Dummy {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "dummy")
            }
        }
        impl Error for Dummy {}
        impl DroverError for Dummy {
            fn error_code(&self) -> &'static str {
                "DUMMY"
            }
        }
        let boxed: Box<dyn DroverError> = Box::new(Dummy);
        assert_eq!(boxed.error_code(), "DUMMY");
        assert!(!boxed.is_user_error());
    }
}
