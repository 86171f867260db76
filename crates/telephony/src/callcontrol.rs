//! Call-control payload rendering
//!
//! Webhook handlers answer the provider with an XML document describing
//! what to do next on the live call: speak or play a reply, gather the next
//! utterance, or terminate.

/// A rendered call-control document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallControl(String);

impl CallControl {
    pub fn as_xml(&self) -> &str {
        &self.0
    }

    pub fn into_xml(self) -> String {
        self.0
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn gather_block(action_url: &str, inner: &str) -> String {
    format!(
        r#"<Gather input="speech" timeout="3" speechTimeout="auto" action="{}" method="POST">{}<Pause length="5"/></Gather><Redirect>{}</Redirect>"#,
        action_url, inner, action_url
    )
}

fn document(body: &str) -> CallControl {
    CallControl(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response>{}</Response>"#,
        body
    ))
}

/// Speak a reply in the fallback voice, then gather the next utterance
pub fn speak_and_gather(text: &str, voice: &str, action_url: &str) -> CallControl {
    let say = format!(
        r#"<Say voice="{}">{}</Say>"#,
        escape_xml(voice),
        escape_xml(text)
    );
    document(&gather_block(action_url, &say))
}

/// Play synthesized audio, then gather the next utterance
pub fn play_and_gather(audio_url: &str, action_url: &str) -> CallControl {
    let play = format!(r#"<Play>{}</Play>"#, escape_xml(audio_url));
    document(&gather_block(action_url, &play))
}

/// Speak one or more closing lines and hang up
///
/// Used for graceful call ends, voicemail drops, and the scripted apology
/// on mid-call failures. Never leaves the call silent.
pub fn terminal_message(lines: &[&str], voice: &str) -> CallControl {
    let mut body = String::new();
    for (i, line) in lines.iter().filter(|l| !l.is_empty()).enumerate() {
        if i > 0 {
            body.push_str(r#"<Pause length="1"/>"#);
        }
        body.push_str(&format!(
            r#"<Say voice="{}">{}</Say>"#,
            escape_xml(voice),
            escape_xml(line)
        ));
    }
    body.push_str("<Hangup/>");
    document(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speak_and_gather_structure() {
        let control = speak_and_gather("Hello there", "Polly.Joanna", "/webhooks/voice/input/abc");
        let xml = control.as_xml();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<Say voice="Polly.Joanna">Hello there</Say>"#));
        assert!(xml.contains(r#"action="/webhooks/voice/input/abc""#));
        assert!(xml.contains("<Redirect>/webhooks/voice/input/abc</Redirect>"));
        assert!(!xml.contains("<Hangup/>"));
    }

    #[test]
    fn play_and_gather_uses_audio_url() {
        let control = play_and_gather("https://host/media/1", "/webhooks/voice/input/abc");
        assert!(control.as_xml().contains("<Play>https://host/media/1</Play>"));
    }

    #[test]
    fn terminal_message_always_hangs_up() {
        let control = terminal_message(&["Thanks for your time.", "Have a great day!"], "Polly.Joanna");
        let xml = control.as_xml();
        assert!(xml.contains("Thanks for your time."));
        assert!(xml.contains("Have a great day!"));
        assert!(xml.contains(r#"<Pause length="1"/>"#));
        assert!(xml.ends_with("<Hangup/></Response>"));
    }

    #[test]
    fn escapes_reserved_characters() {
        let control = speak_and_gather("Rates < 5% & \"fast\"", "Polly.Joanna", "/cb");
        let xml = control.as_xml();
        assert!(xml.contains("Rates &lt; 5% &amp; &quot;fast&quot;"));
    }

    #[test]
    fn empty_lines_are_skipped() {
        let control = terminal_message(&["", "Goodbye."], "Polly.Joanna");
        let xml = control.as_xml();
        assert!(!xml.contains(r#"<Say voice="Polly.Joanna"></Say>"#));
        assert!(xml.contains("Goodbye."));
    }
}
