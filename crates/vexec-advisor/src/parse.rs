use serde::de::DeserializeOwned;

use crate::advisor::AdvisorError;

/// Slice from the first `{` to the last `}`; models often wrap JSON in prose
/// or code fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, AdvisorError> {
    let json = extract_json_object(text)
        .ok_or_else(|| AdvisorError::InvalidReply("no JSON object in reply".to_string()))?;
    serde_json::from_str(json).map_err(|e| AdvisorError::InvalidReply(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::ProgressFeedback;

    #[test]
    fn extracts_object_from_fenced_reply() {
        let text = "Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```\nGood luck!";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn no_object_yields_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn parse_reply_reports_invalid_json() {
        let ok: ProgressFeedback =
            parse_reply("Sure. {\"feedback\": \"Solid month\", \"onTrack\": true}").unwrap();
        assert!(ok.on_track);

        let err = parse_reply::<ProgressFeedback>("{\"feedback\": }").unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidReply(_)));
    }
}
