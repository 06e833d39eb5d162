use ratsync_core::RenderRule;
use ratsync_renderer::{Rendered, Renderer};
use rstest::rstest;

fn rules_from_yaml(yaml: &str) -> Vec<RenderRule> {
    serde_yaml::from_str(yaml).expect("render rules should parse")
}

#[rstest]
#[case::literal_name("MyTemplate ships MyTemplate", "MyProject ships MyProject")]
#[case::untouched("nothing to see", "nothing to see")]
#[case::regex_service("image: tpl-service:latest", "image: acme-service:latest")]
fn renders_lock_record_rules(#[case] input: &str, #[case] expected: &str) {
    let rules = rules_from_yaml(
        r#"
- pattern: MyTemplate
  replacement: MyProject
  literal: true
- ['tpl-(\w+)', 'acme-\1']
"#,
    );
    let renderer = Renderer::new(&rules).expect("compile");
    assert_eq!(renderer.render(input), expected);
}

#[test]
fn empty_rule_list_is_identity() {
    let renderer = Renderer::new(&[]).expect("compile");
    assert!(renderer.is_empty());
    assert_eq!(renderer.render("a\nb\n"), "a\nb\n");
}

#[test]
fn literal_dollar_is_not_expanded() {
    let rules = vec![RenderRule::literal("PRICE", "$1.00").unwrap()];
    let renderer = Renderer::new(&rules).unwrap();
    assert_eq!(renderer.render("cost: PRICE"), "cost: $1.00");
}

#[test]
fn second_invalid_rule_fails_whole_compilation() {
    let rules = vec![
        RenderRule::literal("a", "b").unwrap(),
        RenderRule::regex("[z-a]", "x").unwrap(),
    ];
    let err = Renderer::new(&rules).unwrap_err();
    assert!(err.to_string().contains("[z-a]"), "got: {err}");
}

#[test]
fn rendered_bytes_round_out() {
    let renderer = Renderer::new(&[RenderRule::literal("x", "y").unwrap()]).unwrap();
    let out = renderer.render_bytes(b"xx\n".to_vec());
    assert_eq!(out.as_text(), Some("yy\n"));
    assert_eq!(out.as_bytes(), b"yy\n");

    let png = vec![0x89, b'P', b'N', b'G', 0xff];
    let out = renderer.render_bytes(png.clone());
    assert!(matches!(out, Rendered::Binary(_)));
    assert_eq!(out.into_bytes(), png);
}
