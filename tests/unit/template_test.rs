//! Tests for src/env - shells and the embedded script templates

use gardenctl::env::{Shell, Template};
use rstest::rstest;
use serde_json::json;

fn unset_meta(shell: Shell, cli: &str) -> serde_json::Value {
    json!({
        "meta": {
            "unset": true,
            "commandPath": "gardenctl provider-env",
            "cli": cli,
            "targetFlags": "--garden g --project p --shoot s",
            "credentialKind": "secret",
            "shell": shell.as_str(),
            "prompt": shell.prompt(),
        }
    })
}

// ============================================================================
// Unset scripts for every provider and shell
// ============================================================================

#[rstest]
#[case("aws", "aws", "AWS_ACCESS_KEY_ID")]
#[case("azure", "az", "AZURE_CLIENT_ID")]
#[case("gcp", "gcloud", "GOOGLE_CREDENTIALS")]
#[case("alicloud", "aliyun", "ALIBABA_CLOUD_ACCESS_KEY_ID")]
#[case("hcloud", "hcloud", "HCLOUD_TOKEN")]
#[case("openstack", "openstack", "OS_AUTH_URL")]
#[case("stackit", "stackit", "STACKIT_PROJECT_ID")]
fn test_unset_templates_render_for_all_shells(
    #[case] provider: &str,
    #[case] cli: &str,
    #[case] variable: &str,
) {
    for shell in Shell::ALL {
        let template = Template::for_name(shell, provider, None).unwrap();
        let out = template.render(provider, &unset_meta(shell, cli)).unwrap();
        assert!(out.contains(variable), "{provider}/{shell:?}: {out}");
        assert!(out.contains("reset the"), "{provider}/{shell:?}: {out}");
        assert!(out.contains("gardenctl provider-env -u"), "{provider}/{shell:?}: {out}");
    }
}

#[test]
fn test_unset_fish_syntax() {
    let template = Template::for_name(Shell::Fish, "hcloud", None).unwrap();
    let out = template.render("hcloud", &unset_meta(Shell::Fish, "hcloud")).unwrap();
    assert!(out.starts_with("set -e HCLOUD_TOKEN;\n"));
    assert!(out.contains("eval (gardenctl provider-env -u fish)"));
}

// ============================================================================
// kubernetes and abort templates
// ============================================================================

#[test]
fn test_kubernetes_export_bash() {
    let data = json!({
        "meta": {
            "unset": false,
            "commandPath": "gardenctl kubectl-env",
            "cli": "kubectl",
            "shell": "bash",
            "prompt": "$ ",
        },
        "filename": "/tmp/session/kubeconfig.yaml",
    });
    let template = Template::for_name(Shell::Bash, "kubernetes", None).unwrap();
    let out = template.render("kubernetes", &data).unwrap();
    assert!(out.starts_with("export KUBECONFIG='/tmp/session/kubeconfig.yaml';\n"));
    assert!(out.contains("# Run this command to configure kubectl for your shell:"));
}

#[test]
fn test_abort_lines_are_quoted() {
    let template = Template::for_name(Shell::Zsh, "abort", None).unwrap();
    let out = template
        .render("abort", &json!({ "lines": ["it's restricted", "$(rm -rf /)"] }))
        .unwrap();
    assert!(out.starts_with("printf '%s\\n' 'it'\"'\"'s restricted' '$(rm -rf /)';"));
}

#[test]
fn test_unknown_template_name() {
    assert!(Template::for_name(Shell::Bash, "does-not-exist", None).is_err());
}
