/**
 * \brief 兜底回复所属的话题分组，按匹配优先级排列。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTopic {
    Greeting,
    Help,
    Company,
    Contact,
    SwitchDisconnectors,
    ChangeoverSwitches,
    Specifications,
    Installation,
    OffTopic,
    Default,
}

struct KeywordGroup {
    topic: FallbackTopic,
    keywords: &'static [&'static str],
    reply: &'static str,
}

const GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        topic: FallbackTopic::Greeting,
        keywords: &["hello", "hi", "hey"],
        reply: "Hello! Welcome to LOVATO Electric. I'm here to help you with information about our electrical products and solutions. How can I assist you today?",
    },
    KeywordGroup {
        topic: FallbackTopic::Help,
        keywords: &["help", "support"],
        reply: "I'm here to help you with LOVATO Electric products and services! I can provide information about our switch disconnectors, changeover switches, electrical equipment, and more. What would you like to know?",
    },
    KeywordGroup {
        topic: FallbackTopic::Company,
        keywords: &["company", "about", "lovato"],
        reply: "LOVATO Electric is a leading electrical solutions provider specializing in electrical equipment, automation, and energy management solutions. We offer a wide range of products including switch disconnectors, changeover switches, and electrical components for industrial applications.",
    },
    KeywordGroup {
        topic: FallbackTopic::Contact,
        keywords: &["contact", "phone", "email", "address"],
        reply: "You can contact LOVATO Electric USA at: 2017 Georgetown Blvd., Chesapeake, VA 23325, United States. Phone: +1 757 545-4700. Email: sales@lovatousa.com. We serve customers across multiple countries including USA, Canada, UK, Germany, France, Italy, and many others.",
    },
    KeywordGroup {
        topic: FallbackTopic::SwitchDisconnectors,
        keywords: &["switch disconnector", "gl series", "disconnector"],
        reply: "LOVATO Electric offers GL series switch disconnectors up to 1000A. These feature extremely compact bodies, fast actuation technology, and can handle loads up to 1000A at 500V or 800A for higher voltages. They're available in UL98 versions for USA/Canada applications from 100A to 800A and can be mounted with 4 screws without positioning restrictions.",
    },
    KeywordGroup {
        topic: FallbackTopic::ChangeoverSwitches,
        keywords: &["changeover", "glc", "transfer switch"],
        reply: "Our GLC changeover switches are pre-assembled in three-pole and four-pole configurations. They feature compact design, electrical compatibility for various applications, and can be plate-mounted using 4 screws. They include transparent windows to view power contact positions and integrated padlock fittings.",
    },
    KeywordGroup {
        topic: FallbackTopic::Specifications,
        keywords: &["specification", "rating", "voltage", "current"],
        reply: "LOVATO Electric products feature high protection ratings (IP66, IP69K, NEMA 4X), UL508A compliance for door interlock handles, and support for various installation requirements. Our switch disconnectors can handle up to 1000A at 500V with category AC23A switching capability.",
    },
    KeywordGroup {
        topic: FallbackTopic::Installation,
        keywords: &["install", "mount", "accessory", "handle"],
        reply: "Our products can be mounted with 4 screws without positioning restrictions. We offer door interlock handles with various shaft lengths, auxiliary contacts, terminal covers, phase barriers, and more. All accessories snap on securely for quick, tool-free installation.",
    },
    KeywordGroup {
        topic: FallbackTopic::OffTopic,
        keywords: &[
            "weather", "sport", "movie", "music", "recipe", "travel", "politics", "news",
        ],
        reply: "I'm sorry, I don't know about that. I'm specifically designed to help with LOVATO Electric products and services. Is there anything I can help you with regarding our electrical equipment, switch disconnectors, or other LOVATO products?",
    },
];

const DEFAULT_REPLY: &str = "I'm here to help with LOVATO Electric products and services. I can provide information about our switch disconnectors, changeover switches, electrical equipment, and technical specifications. What would you like to know about our products?";

/**
 * \brief 按关键字（不区分大小写的子串匹配）选出兜底回复，首个命中的分组生效。
 */
pub fn classify(message: &str) -> (FallbackTopic, &'static str) {
    let lowered = message.to_lowercase();
    GROUPS
        .iter()
        .find(|group| group.keywords.iter().any(|k| lowered.contains(k)))
        .map(|group| (group.topic, group.reply))
        .unwrap_or((FallbackTopic::Default, DEFAULT_REPLY))
}

/**
 * \brief 兜底回复文本，永不为空。
 */
pub fn respond(message: &str) -> &'static str {
    classify(message).1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_expected_groups() {
        assert_eq!(classify("Hello there!").0, FallbackTopic::Greeting);
        assert_eq!(classify("what's the weather").0, FallbackTopic::OffTopic);
        assert_eq!(classify("xyz").0, FallbackTopic::Default);
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(classify("GLC ratings?").0, FallbackTopic::ChangeoverSwitches);
        assert_eq!(classify("Tell me about LOVATO").0, FallbackTopic::Company);
    }

    #[test]
    fn earlier_groups_win() {
        // "support" and "contact" both match; help is tried first.
        assert_eq!(classify("support contact").0, FallbackTopic::Help);
        // "this" contains "hi", so the greeting group wins over installation.
        assert_eq!(classify("install this").0, FallbackTopic::Greeting);
    }

    #[test]
    fn always_returns_text() {
        assert!(!respond("").is_empty());
        assert_eq!(respond("zzz"), DEFAULT_REPLY);
    }
}
