use serde::{Deserialize, Serialize};

/// One line-delimited JSON command from a client.
#[derive(Debug, Deserialize)]
pub struct CommandReq {
    pub command: String,
    pub params: Option<serde_json::Value>,
}

/// Params for the STRUCTURE and TRACE commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct CodeParams {
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parses_with_params() {
        let req: CommandReq =
            serde_json::from_str(r#"{"command": "STRUCTURE", "params": {"code": "x = 1"}}"#)
                .unwrap();
        assert_eq!(req.command, "STRUCTURE");
        let params: CodeParams = serde_json::from_value(req.params.unwrap()).unwrap();
        assert_eq!(params.code, "x = 1");
    }

    #[test]
    fn test_command_params_optional() {
        let req: CommandReq = serde_json::from_str(r#"{"command": "PING"}"#).unwrap();
        assert!(req.params.is_none());
    }
}
