//! Prompt templates
//!
//! Placeholders use `{{key}}` and are filled by `runtime::compose_context`.

pub const VERIFY_DATA_TEMPLATE: &str = r#"Respond with a JSON object containing the parameters needed to verify data with ATTPs.
Extract them from the most recent messages of the conversation below.

Recent messages:
{{recentMessages}}

Fields:
- agent: the agent contract address (0x-prefixed hex string)
- digest: the agent settings digest (0x-prefixed 32-byte hex string)
- payload.data: the data to verify (0x-prefixed hex string)
- payload.dataHash: hash of the data, only if the user provided one
- payload.signatures: list of signatures, each with r and s (hex strings) and v (number: 0, 1, 27 or 28)
- payload.metadata: optional object with contentType, encoding and compression strings

Example response:
```json
{
    "agent": "0x0000000000000000000000000000000000000000",
    "digest": "0x0000000000000000000000000000000000000000000000000000000000000000",
    "payload": {
        "data": "0x...",
        "dataHash": "0x...",
        "signatures": [
            {
                "r": "0x...",
                "s": "0x...",
                "v": 27
            }
        ],
        "metadata": {
            "contentType": "application/json",
            "encoding": "",
            "compression": ""
        }
    }
}
```

Only use values that appear in the conversation. Respond with the JSON object only."#;
