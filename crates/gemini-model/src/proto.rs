use maitre_model::{ChatMessage, CompletionRequest, FinishReason};
use serde::{Deserialize, Serialize};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct GenerateContentChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Part {
    text: String,
}

// -----------
// Conversions
// -----------

/// Builds the request payload for the streaming endpoint.
///
/// The transcript roles map to the upstream vocabulary: user turns keep
/// the `user` role, assistant turns become `model`. System messages are
/// folded into `system_instruction` verbatim.
#[inline]
pub fn create_request(req: &CompletionRequest) -> GenerateContentRequest {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();
    for msg in &req.messages {
        match msg {
            ChatMessage::System(text) => {
                system_parts.push(Part { text: text.clone() });
            }
            ChatMessage::User(text) => contents.push(Content {
                role: "user",
                parts: vec![Part { text: text.clone() }],
            }),
            ChatMessage::Assistant(text) => contents.push(Content {
                role: "model",
                parts: vec![Part { text: text.clone() }],
            }),
        }
    }
    GenerateContentRequest {
        system_instruction: if system_parts.is_empty() {
            None
        } else {
            Some(SystemInstruction {
                parts: system_parts,
            })
        },
        contents,
    }
}

#[inline]
pub fn create_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::MaxTokens,
        "SAFETY" => FinishReason::Safety,
        _ => FinishReason::Other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_request() {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::System("You are a helpful assistant.".to_owned()),
                ChatMessage::Assistant("Xin chào!".to_owned()),
                ChatMessage::User("Hello".to_owned()),
            ],
        };
        let payload = serde_json::to_value(create_request(&request)).unwrap();
        assert_eq!(
            payload,
            json!({
                "system_instruction": {
                    "parts": [{ "text": "You are a helpful assistant." }]
                },
                "contents": [
                    { "role": "model", "parts": [{ "text": "Xin chào!" }] },
                    { "role": "user", "parts": [{ "text": "Hello" }] },
                ]
            })
        );
    }

    #[test]
    fn test_request_without_system_message() {
        let request = CompletionRequest {
            messages: vec![ChatMessage::User("Hi".to_owned())],
        };
        let payload = serde_json::to_value(create_request(&request)).unwrap();
        assert_eq!(
            payload,
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "Hi" }] },
                ]
            })
        );
    }

    #[test]
    fn test_parse_chunk() {
        let chunk: GenerateContentChunk = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Chúng tôi " }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        let candidate = &chunk.candidates[0];
        assert_eq!(
            candidate.content.as_ref().unwrap().parts[0].text.as_deref(),
            Some("Chúng tôi ")
        );
        assert_eq!(
            create_finish_reason(candidate.finish_reason.as_deref().unwrap()),
            FinishReason::Stop
        );
    }
}
