pub fn message_endpoint(id: &str) -> String {
    format!("/gmail/v1/users/me/messages/{id}")
}

pub fn list_endpoint() -> &'static str {
    "/gmail/v1/users/me/messages"
}

pub fn send_endpoint() -> &'static str {
    "/gmail/v1/users/me/messages/send"
}

pub fn modify_endpoint(id: &str) -> String {
    format!("/gmail/v1/users/me/messages/{id}/modify")
}

pub fn get_query() -> Vec<(String, String)> {
    vec![("format".to_string(), "full".to_string())]
}

pub fn list_query(query: &str, max_results: u32, label_ids: &[String]) -> Vec<(String, String)> {
    let mut params = vec![
        ("maxResults".to_string(), max_results.to_string()),
        ("q".to_string(), query.to_string()),
    ];

    for label_id in label_ids {
        params.push(("labelIds".to_string(), label_id.clone()));
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_repeats_label_ids() {
        let params = list_query("in:inbox", 25, &["INBOX".to_string(), "UNREAD".to_string()]);
        assert!(params.contains(&("maxResults".to_string(), "25".to_string())));
        assert!(params.contains(&("q".to_string(), "in:inbox".to_string())));
        assert_eq!(
            params
                .iter()
                .filter(|(key, _)| key == "labelIds")
                .count(),
            2
        );
    }

    #[test]
    fn get_query_requests_full_format() {
        assert_eq!(
            get_query(),
            vec![("format".to_string(), "full".to_string())]
        );
    }
}
