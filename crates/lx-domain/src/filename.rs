use crate::error::ConfigurationError;

/// Rejects output names that would be misread as a transport reference or
/// break when echoed through a shell.
pub fn validate_file_name(name: &str) -> Result<(), ConfigurationError> {
    let found = name.chars().find(|ch| *ch == ':' || ch.is_control());
    match found {
        Some(found) => Err(ConfigurationError::InvalidFileName {
            name: name.to_string(),
            found,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_paths() {
        for name in ["out.tar", "./dist/alpine.tar", "/tmp/a b/image", "../rel/out"] {
            assert!(validate_file_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_transport_separator() {
        let err = validate_file_name("docker-archive:out.tar").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::InvalidFileName {
                name: "docker-archive:out.tar".into(),
                found: ':',
            }
        );
        assert_eq!(err.code(), "LX102");
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_file_name("out\n.tar").is_err());
        assert!(validate_file_name("out\0.tar").is_err());
        assert!(validate_file_name("out\r").is_err());
    }
}
