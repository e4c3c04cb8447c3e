//! `napcat call`

use napcat_client::NapCatClient;
use napcat_utils::Result;
use serde_json::Value;

/// Parse `--params`; only JSON objects are accepted
pub fn parse_params(raw: &str) -> std::result::Result<Value, String> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid --params JSON: {}", e))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err("--params must be a JSON object".into())
    }
}

/// Call `action` and print the response data as pretty JSON
pub async fn run(client: &NapCatClient, action: &str, params: Value) -> Result<i32> {
    let response = client.call_action(action, params).await?;

    if response.is_ok() {
        let pretty = serde_json::to_string_pretty(&response.data)
            .unwrap_or_else(|_| response.data.to_string());
        println!("{}", pretty);
        Ok(0)
    } else {
        eprintln!(
            "error: {} failed (status {:?}, retcode {}): {}",
            action,
            response.status,
            response.retcode,
            response.error_message()
        );
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use napcat_client::transport::memory;
    use napcat_client::ConnectionOptions;
    use serde_json::json;

    #[test]
    fn test_parse_params() {
        assert_eq!(parse_params(r#"{"user_id": 1}"#).unwrap(), json!({"user_id": 1}));
        assert!(parse_params("[1]").unwrap_err().contains("JSON object"));
        assert!(parse_params("{").unwrap_err().contains("invalid --params"));
    }

    #[tokio::test]
    async fn test_run_exit_codes() {
        let (transport, mut peer) = memory::pair();
        let client = NapCatClient::from_transport(transport, ConnectionOptions::default()).unwrap();

        let responder = tokio::spawn(async move {
            for retcode in [0, 100] {
                let request = peer.recv_frame().await.unwrap();
                peer.send_json(json!({
                    "status": if retcode == 0 { "ok" } else { "failed" },
                    "retcode": retcode,
                    "data": {"ok": retcode == 0},
                    "echo": request.get_str("echo").unwrap()
                }));
            }
            peer
        });

        assert_eq!(run(&client, "get_status", json!({})).await.unwrap(), 0);
        assert_eq!(run(&client, "get_status", json!({})).await.unwrap(), 1);

        let _peer = responder.await.unwrap();
        client.close().await;
    }
}
