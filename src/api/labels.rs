pub fn list_labels_endpoint() -> &'static str {
    "/gmail/v1/users/me/labels"
}
