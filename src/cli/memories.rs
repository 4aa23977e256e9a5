use crate::profile::Profile;

/// Print stored memories: a relevance search when `query` is given, else the newest entries.
pub async fn list(profile: &Profile, user: &str, query: Option<&str>, limit: usize) {
    let entries = match query {
        Some(q) => profile.search(q, limit).await,
        None => profile.recent(limit).await,
    };

    println!(
        "User: {user}, {} memor{} ({} backend)\n",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        profile.backend()
    );
    for entry in &entries {
        println!(
            "- [{}] {}: {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.role,
            entry.text.replace('\n', " / ")
        );
    }
}
