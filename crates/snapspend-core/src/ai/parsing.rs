//! Response parsing and HTTP error classification
//!
//! Pure functions shared by the Gemini backend and its tests.

use crate::error::{Error, Result};

use super::types::{ApiErrorResponse, ExtractedReceipt};

/// Find the first top-level `{...}` object in model output.
///
/// Braces inside JSON string literals (including escaped quotes) do not
/// count towards nesting. Returns `None` if no object closes.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the extraction reply into receipt fields
pub fn parse_extracted_receipt(response: &str) -> Result<ExtractedReceipt> {
    let json_str = extract_json_object(response).ok_or_else(|| {
        Error::MalformedResponse("No JSON object found in extraction response".into())
    })?;

    serde_json::from_str(json_str)
        .map_err(|e| Error::MalformedResponse(format!("Invalid receipt JSON: {}", e)))
}

/// User-facing text for an HTTP failure; `raw` is the server's own message
pub fn user_message(status: u16, raw: &str) -> String {
    match status {
        429 => "Request limit exceeded. Wait 1 minute and try again. Limits: 15 req/min or 1500 req/day.".to_string(),
        404 => "Model not found. Run `snapspend quota` to check the configured model.".to_string(),
        401 | 403 => "Invalid API key or missing permission. Check GEMINI_API_KEY in your environment.".to_string(),
        503 => "Service temporarily unavailable. Retrying...".to_string(),
        400 => "Malformed request. Check the message format.".to_string(),
        _ => raw.to_string(),
    }
}

/// Turn a non-2xx response into a typed error.
///
/// 401, 403 and 404 are credential or model problems and never retry, whatever
/// the body says. For any other status, 429/503 or a rate-limit/overload
/// marker in the server message or its canonical status name decides.
pub fn classify_http_error(status: u16, body: &str) -> Error {
    let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
    let raw_message = parsed
        .as_ref()
        .and_then(|p| p.error.message.clone())
        .unwrap_or_else(|| body.trim().to_string());
    let status_name = parsed
        .as_ref()
        .and_then(|p| p.error.status.clone())
        .unwrap_or_default();

    if matches!(status, 401 | 403 | 404) {
        return Error::ClientError {
            status,
            message: user_message(status, &raw_message),
        };
    }

    let haystack = format!("{} {}", raw_message, status_name);
    let lower = haystack.to_lowercase();

    let rate_limited = status == 429
        || haystack.contains("RESOURCE_EXHAUSTED")
        || haystack.contains("Too Many Requests")
        || lower.contains("quota");
    if rate_limited {
        return Error::RateLimited {
            status,
            message: user_message(429, &raw_message),
        };
    }

    let unavailable =
        status == 503 || haystack.contains("UNAVAILABLE") || lower.contains("overloaded");
    if unavailable {
        return Error::ServiceUnavailable {
            status,
            message: user_message(503, &raw_message),
        };
    }

    let message = user_message(status, &raw_message);
    if (400..500).contains(&status) {
        Error::ClientError { status, message }
    } else {
        Error::ServerError { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::models::Category;

    #[test]
    fn test_extract_json_object_plain() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_json_object_with_prose() {
        let response = "Here is the receipt:\n```json\n{\"totalAmount\": 10, \"items\": [{\"name\": \"x\"}]}\n```\nDone!";
        assert_eq!(
            extract_json_object(response),
            Some("{\"totalAmount\": 10, \"items\": [{\"name\": \"x\"}]}")
        );
    }

    #[test]
    fn test_extract_json_object_ignores_braces_in_strings() {
        let response = r#"{"storeName": "Bar {the} \"best\" }", "totalAmount": 3} trailing }"#;
        assert_eq!(
            extract_json_object(response),
            Some(r#"{"storeName": "Bar {the} \"best\" }", "totalAmount": 3}"#)
        );
    }

    #[test]
    fn test_extract_json_object_unbalanced() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{\"a\": {\"b\": 1}"), None);
    }

    #[test]
    fn test_parse_extracted_receipt() {
        let response = r#"Sure! {"totalAmount": 27.0, "date": "2024-01-15", "time": "09:12",
            "storeName": "Farmácia", "category": "health", "items": []}"#;
        let receipt = parse_extracted_receipt(response).unwrap();
        assert_eq!(receipt.total_amount, Some(27.0));
        assert_eq!(receipt.store_name.as_deref(), Some("Farmácia"));
        assert_eq!(receipt.category, Some(Category::Health));
    }

    #[test]
    fn test_parse_extracted_receipt_malformed() {
        assert!(matches!(
            parse_extracted_receipt("I could not read the receipt."),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_extracted_receipt(r#"{"totalAmount": }"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_user_message_lookup() {
        assert!(user_message(429, "x").starts_with("Request limit exceeded"));
        assert!(user_message(404, "x").contains("snapspend quota"));
        assert_eq!(user_message(401, "x"), user_message(403, "y"));
        assert_eq!(user_message(503, "x"), "Service temporarily unavailable. Retrying...");
        assert_eq!(user_message(400, "x"), "Malformed request. Check the message format.");
        assert_eq!(user_message(500, "Internal error"), "Internal error");
    }

    #[test]
    fn test_classify_by_status() {
        let err = classify_http_error(429, r#"{"error":{"code":429,"message":"slow"}}"#);
        assert_eq!(err.kind(), FailureKind::RateLimited);
        assert!(err.to_string().starts_with("Gemini API error (429): Request limit exceeded"));

        let err = classify_http_error(503, "");
        assert_eq!(err.kind(), FailureKind::Unavailable);

        let err = classify_http_error(400, r#"{"error":{"message":"bad field"}}"#);
        assert!(matches!(err, Error::ClientError { status: 400, .. }));
        assert_eq!(err.kind(), FailureKind::NonRetryable);

        let err = classify_http_error(403, r#"{"error":{"message":"denied"}}"#);
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_classify_by_message() {
        let err = classify_http_error(
            400,
            r#"{"error":{"message":"Quota exceeded for metric","status":"FAILED_PRECONDITION"}}"#,
        );
        assert_eq!(err.kind(), FailureKind::RateLimited);

        let err = classify_http_error(
            500,
            r#"{"error":{"message":"backend busy","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert_eq!(err.kind(), FailureKind::RateLimited);

        let err = classify_http_error(500, r#"{"error":{"message":"The model is overloaded."}}"#);
        assert_eq!(err.kind(), FailureKind::Unavailable);
    }

    #[test]
    fn test_classify_keeps_status_actually_sent() {
        let err = classify_http_error(500, r#"{"error":{"message":"The model is overloaded."}}"#);
        assert!(matches!(err, Error::ServiceUnavailable { status: 500, .. }));
        assert_eq!(
            err.to_string(),
            "Gemini API error (500): Service temporarily unavailable. Retrying..."
        );

        let err = classify_http_error(
            400,
            r#"{"error":{"message":"Quota exceeded for metric","status":"FAILED_PRECONDITION"}}"#,
        );
        assert!(matches!(err, Error::RateLimited { status: 400, .. }));
        assert!(err.to_string().starts_with("Gemini API error (400): Request limit exceeded"));
    }

    #[test]
    fn test_classify_permission_denied_mentioning_quota() {
        let body = r#"{"error":{"code":403,"message":"The API requires a quota project, which is not set by default.","status":"PERMISSION_DENIED"}}"#;
        let err = classify_http_error(403, body);

        assert!(matches!(err, Error::ClientError { status: 403, .. }));
        assert_eq!(err.kind(), FailureKind::NonRetryable);
        assert_eq!(
            err.to_string(),
            "Gemini API error (403): Invalid API key or missing permission. Check GEMINI_API_KEY in your environment."
        );
    }

    #[test]
    fn test_classify_model_not_found_never_retries() {
        let err = classify_http_error(
            404,
            r#"{"error":{"message":"models/gemini-x is not found or is UNAVAILABLE for this API version","status":"NOT_FOUND"}}"#,
        );
        assert!(matches!(err, Error::ClientError { status: 404, .. }));
        assert!(err.to_string().contains("snapspend quota"));
    }

    #[test]
    fn test_classify_unknown_status_keeps_raw_message() {
        let err = classify_http_error(500, r#"{"error":{"message":"Internal error encountered."}}"#);
        match err {
            Error::ServerError { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal error encountered.");
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = classify_http_error(502, "<html>Bad Gateway</html>");
        assert_eq!(err.to_string(), "Gemini API error (502): <html>Bad Gateway</html>");
    }
}
