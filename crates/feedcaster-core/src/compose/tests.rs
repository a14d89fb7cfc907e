use super::*;
use crate::error::CollaboratorError;
use proptest::prelude::*;
use serde_json::json;

fn feed_composer(config: ComposeConfig) -> Composer {
    Composer::new(&config, ComposeMode::Feed).unwrap()
}

struct Albums(u32);

impl AlbumCounter for Albums {
    fn image_count(&self, _album_url: &str) -> std::result::Result<u32, CollaboratorError> {
        Ok(self.0)
    }
}

// ── Budget ───────────────────────────────────────────────────────────────────

#[test]
fn long_value_is_cut_to_remaining_budget() {
    let composer = feed_composer(
        ComposeConfig::new("Say: {X}")
            .with_max_length(20)
            .with_short_url_length(23)
            .with_variable(TemplateVariable::path("{X}", "x").truncatable()),
    );
    let out = composer
        .render_record(&json!({"x": "this is a very long message"}), None)
        .unwrap();
    assert_eq!(out.text, "Say: this is a very");
    assert!(out.text.len() <= 20);
}

#[test]
fn short_value_is_kept_whole() {
    let composer = feed_composer(
        ComposeConfig::new("Say: {X}")
            .with_max_length(20)
            .with_variable(TemplateVariable::path("{X}", "x").truncatable()),
    );
    let out = composer.render_record(&json!({"x": "hi"}), None).unwrap();
    assert_eq!(out.text, "Say: hi");
}

#[test]
fn secure_links_cost_one_more_than_plain() {
    let composer = feed_composer(ComposeConfig::new("x").with_short_url_length(23));
    assert_eq!(composer.normalized_len("https://example.com/abc"), 24);
    assert_eq!(composer.normalized_len("http://example.com/a/very/long/path"), 23);
    assert_eq!(composer.normalized_len("a https://e.co b"), 2 + 24 + 2);
}

#[test]
fn link_in_template_keeps_literal_url_but_counts_placeholder_width() {
    let long_url = format!("https://example.com/{}", "p".repeat(100));
    let composer = feed_composer(
        ComposeConfig::new(format!("{{T}} {}", long_url))
            .with_max_length(40)
            .with_variable(TemplateVariable::path("{T}", "t").truncatable()),
    );
    let out = composer
        .render_record(&json!({"t": "abcdefghijklmnopqrstuvwxyz"}), None)
        .unwrap();
    // 40 - (3 + 1 + 24) + 3 = 15 bytes for the title
    assert_eq!(out.text, format!("abcdefghijklmno {}", long_url));
}

#[test]
fn value_with_links_fits_when_shortened_length_fits() {
    let composer = feed_composer(
        ComposeConfig::new("{T}")
            .with_max_length(30)
            .with_short_url_length(10)
            .with_variable(TemplateVariable::path("{T}", "t").truncatable()),
    );
    let value = format!("see https://example.com/{}", "z".repeat(60));
    let out = composer.render_record(&json!({ "t": value }), None).unwrap();
    assert_eq!(out.text, value);
}

#[test]
fn overspent_budget_substitutes_nothing() {
    let composer = feed_composer(
        ComposeConfig::new("{fixed} {T}")
            .with_max_length(10)
            .with_variable(TemplateVariable::path("{fixed}", "f"))
            .with_variable(TemplateVariable::path("{T}", "t").truncatable()),
    );
    let out = composer
        .render_record(&json!({"f": "0123456789abcdef", "t": "gone"}), None)
        .unwrap();
    assert_eq!(out.text, "0123456789abcdef");
}

#[test]
fn truncation_never_splits_a_character() {
    let composer = feed_composer(
        ComposeConfig::new("{T}")
            .with_max_length(5)
            .with_variable(TemplateVariable::path("{T}", "t").truncatable()),
    );
    let out = composer.render_record(&json!({"t": "ééééé"}), None).unwrap();
    assert_eq!(out.text, "éé");
}

#[test]
fn only_first_truncatable_is_cut() {
    let composer = feed_composer(
        ComposeConfig::new("{A}|{B}")
            .with_max_length(8)
            .with_variable(TemplateVariable::path("{A}", "a").truncatable())
            .with_variable(TemplateVariable::path("{B}", "b").truncatable()),
    );
    let out = composer
        .render_record(&json!({"a": "aaaaaaaaaa", "b": "bbbbbbbbbb"}), None)
        .unwrap();
    // budget 8 - len("{A}|{B}") + 3 = 4
    assert_eq!(out.text, "aaaa|bbbbbbbbbb");
}

// ── Mentions ─────────────────────────────────────────────────────────────────

#[test]
fn feed_mode_escapes_mentions_everywhere() {
    let composer = feed_composer(
        ComposeConfig::new("@{who} {T}")
            .with_variable(TemplateVariable::path("{who}", "who"))
            .with_variable(TemplateVariable::path("{T}", "t").truncatable()),
    );
    let out = composer
        .render_record(&json!({"who": "alice", "t": "cc @bob"}), None)
        .unwrap();
    assert_eq!(out.text, r"@\alice cc @\bob");
}

#[test]
fn record_mode_uses_hash_marker() {
    let composer = Composer::new(
        &ComposeConfig::new("{T}").with_variable(TemplateVariable::field("{T}", "body").truncatable()),
        ComposeMode::Record,
    )
    .unwrap();
    let out = composer.render_record(&json!({"body": "hi @bob"}), None).unwrap();
    assert_eq!(out.text, "hi #bob");
}

#[test]
fn mentions_survive_when_allowed_and_marker_is_configurable() {
    let config = ComposeConfig::new("{T}")
        .with_variable(TemplateVariable::path("{T}", "t").truncatable());

    let allowed = feed_composer(config.clone().with_allow_mentions(true));
    assert_eq!(
        allowed.render_record(&json!({"t": "@bob"}), None).unwrap().text,
        "@bob"
    );

    let custom = feed_composer(config.with_mention_marker("(at)"));
    assert_eq!(
        custom.render_record(&json!({"t": "@bob"}), None).unwrap().text,
        "(at)bob"
    );
}

#[test]
fn truncatable_value_is_html_unescaped() {
    let composer = feed_composer(
        ComposeConfig::new("{T}").with_variable(TemplateVariable::path("{T}", "t").truncatable()),
    );
    let out = composer
        .render_record(&json!({"t": "Tom &amp; Jerry &#8211; &quot;live&quot;"}), None)
        .unwrap();
    assert_eq!(out.text, "Tom & Jerry \u{2013} \"live\"");
}

// ── Special values ───────────────────────────────────────────────────────────

#[test]
fn media_type_records_fetchable_attachment() {
    let composer = feed_composer(
        ComposeConfig::new("[{type}] {title}")
            .with_variable(TemplateVariable::path("{url}", "data.url"))
            .with_variable(TemplateVariable::media_type("{type}", "{url}"))
            .with_variable(TemplateVariable::path("{title}", "data.title").truncatable()),
    );
    let record = json!({"data": {
        "url": "https://imgur.com/a/xyz",
        "title": "three cats",
        "permalink": "/r/cats/comments/1/three_cats/"
    }});

    let out = composer.render_record(&record, Some(&Albums(3))).unwrap();
    assert_eq!(out.text, "[album:3] three cats");
    let attachment = out.attachment.unwrap();
    assert_eq!(attachment.url.as_deref(), Some("https://imgur.com/a/xyz"));
}

#[test]
fn self_post_has_no_attachment() {
    let composer = feed_composer(
        ComposeConfig::new("{type}")
            .with_variable(TemplateVariable::path("{url}", "data.url"))
            .with_variable(TemplateVariable::media_type("{type}", "{url}")),
    );
    let record = json!({"data": {
        "url": "https://www.reddit.com/r/cats/comments/1/x/",
        "permalink": "/r/cats/comments/1/x/"
    }});
    let out = composer.render_record(&record, None).unwrap();
    assert_eq!(out.text, "self");
    assert!(out.attachment.is_none());
}

#[test]
fn undefined_subject_is_a_config_error() {
    let err = Composer::new(
        &ComposeConfig::new("{type}").with_variable(TemplateVariable::media_type("{type}", "{url}")),
        ComposeMode::Feed,
    )
    .err()
    .unwrap();
    assert!(err.is_fatal());
}

#[test]
fn html_unescape_leaves_unknown_entities() {
    assert_eq!(html_unescape("a &#zz; b &amp;lt;"), "a &#zz; b &lt;");
    assert_eq!(html_unescape("&#x41;&#66;"), "AB");
}

#[test]
fn html_unescape_decodes_named_entities() {
    assert_eq!(html_unescape("It&rsquo;s caf&eacute; time&hellip;"), "It\u{2019}s caf\u{e9} time\u{2026}");
    assert_eq!(html_unescape("<b>&lt;ok&gt;</b>"), "<b><ok></b>");
}

#[test]
fn decoded_entities_count_at_their_decoded_length() {
    let composer = feed_composer(
        ComposeConfig::new("{T}")
            .with_variable(TemplateVariable::path("{T}", "t").truncatable())
            .with_max_length(12),
    );
    let out = composer
        .render_record(&json!({"t": "caf&eacute; &mdash; open late"}), None)
        .unwrap();
    assert!(out.text.starts_with("caf\u{e9} \u{2014}"), "{}", out.text);
    assert!(out.text.len() <= 12);
}

proptest! {
    #[test]
    fn output_fits_budget_without_links(
        fixed in "[a-z ]{0,30}",
        body in "[a-zA-Z0-9 .,!]{0,400}",
        max in 40usize..300,
    ) {
        let composer = feed_composer(
            ComposeConfig::new("{F}: {B}")
                .with_max_length(max)
                .with_variable(TemplateVariable::path("{F}", "f"))
                .with_variable(TemplateVariable::path("{B}", "b").truncatable()),
        );
        let out = composer
            .render_record(&json!({"f": fixed, "b": body}), None)
            .unwrap();
        prop_assert!(out.text.len() <= max || fixed.len() + 2 > max);
        let token = "{B}";
        prop_assert!(!out.text.contains(token));
    }

    #[test]
    fn no_live_mention_survives(body in "[a-z@ ]{0,80}") {
        let composer = feed_composer(
            ComposeConfig::new("{B}").with_variable(TemplateVariable::path("{B}", "b").truncatable()),
        );
        let out = composer.render_record(&json!({"b": body}), None).unwrap();
        for (i, _) in out.text.match_indices('@') {
            prop_assert_eq!(out.text.as_bytes().get(i + 1), Some(&b'\\'));
        }
    }
}
