/// Codes for failures raised outside the request model; configuration codes
/// come from `ConfigurationError::code`.
pub mod codes {
    pub const TERMINAL_OUTPUT: &str = "LX110";
    pub const PRODUCER: &str = "LX201";
    pub const TRANSPORT: &str = "LX301";
    pub const GENERIC: &str = "LX000";
}
