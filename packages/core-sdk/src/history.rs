use crate::models::{ChatMessage, RawHistoryEntry, Role};

/**
 * \brief 将客户端历史整理为 Provider 可接受的交替序列。
 *
 * 输出以唯一的 system 消息开头；历史部分从 user 开始并严格交替，
 * 开头的非 user 条目与连续同角色条目直接丢弃（不合并内容）。
 * 最后追加本次的用户消息。若历史最后一条已是 user，结尾会出现两条连续的 user，
 * 这里保留该行为，不做修正。
 */
pub fn normalize_history(
    system_prompt: &str,
    history: &[RawHistoryEntry],
    message: &str,
) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(history.len() + 2);
    out.push(ChatMessage::system(system_prompt));

    let mut last_role: Option<Role> = None;
    for entry in history {
        let role = entry_role(entry);
        match last_role {
            None if role != Role::User => continue,
            Some(prev) if prev == role => continue,
            _ => {}
        }
        out.push(ChatMessage::new(role, entry.content.clone()));
        last_role = Some(role);
    }

    out.push(ChatMessage::user(message));
    out
}

fn entry_role(entry: &RawHistoryEntry) -> Role {
    if entry.kind == "user" {
        Role::User
    } else {
        Role::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: &str, content: &str) -> RawHistoryEntry {
        RawHistoryEntry::new(kind, content)
    }

    #[test]
    fn empty_history_yields_system_and_message() {
        let out = normalize_history("sys", &[], "hello");
        assert_eq!(out, vec![ChatMessage::system("sys"), ChatMessage::user("hello")]);
    }

    #[test]
    fn drops_leading_and_consecutive_noise() {
        let history = vec![entry("bot", "hi"), entry("user", "a"), entry("user", "b")];
        let out = normalize_history("sys", &history, "c");
        assert_eq!(
            out,
            vec![
                ChatMessage::system("sys"),
                ChatMessage::user("a"),
                ChatMessage::user("c"),
            ]
        );
    }

    #[test]
    fn keeps_well_formed_history() {
        let history = vec![
            entry("user", "q1"),
            entry("assistant", "a1"),
            entry("user", "q2"),
            entry("model", "a2"),
        ];
        let out = normalize_history("sys", &history, "q3");
        let roles: Vec<Role> = out.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
            ]
        );
        assert_eq!(out[4].content, "a2");
    }

    #[test]
    fn type_match_is_literal() {
        let history = vec![entry("User", "not a user"), entry("user", "real")];
        let out = normalize_history("sys", &history, "next");
        assert_eq!(out[1], ChatMessage::user("real"));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn does_not_touch_input() {
        let history = vec![entry("bot", "x"), entry("user", "y")];
        let copy = history.clone();
        let _ = normalize_history("sys", &history, "z");
        assert_eq!(history, copy);
    }

    #[test]
    fn history_portion_always_alternates() {
        let kinds = ["user", "bot", "assistant"];
        for len in 0..=5u32 {
            for mut code in 0..kinds.len().pow(len) {
                let mut history = Vec::new();
                for i in 0..len {
                    history.push(entry(kinds[code % kinds.len()], &format!("m{i}")));
                    code /= kinds.len();
                }
                let out = normalize_history("sys", &history, "new");

                assert_eq!(out.first().map(|m| m.role), Some(Role::System));
                assert_eq!(out.iter().filter(|m| m.role == Role::System).count(), 1);
                assert_eq!(out.last(), Some(&ChatMessage::user("new")));

                let body = &out[1..out.len() - 1];
                if let Some(first) = body.first() {
                    assert_eq!(first.role, Role::User, "history {history:?}");
                }
                for pair in body.windows(2) {
                    assert_ne!(pair[0].role, pair[1].role, "history {history:?}");
                }
            }
        }
    }
}
