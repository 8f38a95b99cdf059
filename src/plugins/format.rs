//! Reply formatting shared by the built-in plugins.

/// Footer appended to every reply.
pub const ABOUT_THIS_BOT: &str = "Instructions for interacting with me using PR comments are available with `/help`. \
If you have questions or suggestions related to my behavior, please open an issue in this repository.";

/// `@to: message` followed by a collapsed block holding `reason` and the footer.
pub fn format_response(to: &str, message: &str, reason: &str) -> String {
    format!("@{to}: {message}\n\n<details>\n\n{reason}\n\n{ABOUT_THIS_BOT}\n</details>")
}

/// Like [`format_response`], quoting the triggering comment as the reason.
pub fn format_response_raw(body: &str, body_url: &str, login: &str, reply: &str) -> String {
    let quoted = body
        .split('\n')
        .map(|line| format!(">{line}"))
        .collect::<Vec<_>>()
        .join("\n");
    let reason = format!("In response to [this]({body_url}):\n\n{quoted}\n");
    format_response(login, reply, &reason)
}
