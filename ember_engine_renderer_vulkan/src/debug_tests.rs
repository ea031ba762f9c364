//! Unit tests for the validation message filters

use ash::vk;
use ember_engine::ember::{DebugMessageFilter, DebugOutput, DebugSeverity, RendererConfig};
use crate::debug::{severity_flags, should_display, Config};

fn config(severity: DebugSeverity) -> Config {
    Config {
        severity,
        output: DebugOutput::Console,
        message_filter: DebugMessageFilter::default(),
        break_on_error: false,
        panic_on_error: false,
        enable_stats: true,
    }
}

#[test]
fn test_severity_flags() {
    assert_eq!(
        severity_flags(DebugSeverity::ErrorsOnly),
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
    );
    assert!(severity_flags(DebugSeverity::ErrorsAndWarnings)
        .contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
    assert!(severity_flags(DebugSeverity::All)
        .contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
}

#[test]
fn test_errors_only_hides_warnings() {
    let cfg = config(DebugSeverity::ErrorsOnly);
    let validation = vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION;
    assert!(should_display(&cfg, vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, validation));
    assert!(!should_display(&cfg, vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, validation));
}

#[test]
fn test_category_filter() {
    let mut cfg = config(DebugSeverity::All);
    cfg.message_filter.show_performance = false;

    let info = vk::DebugUtilsMessageSeverityFlagsEXT::INFO;
    assert!(!should_display(&cfg, info, vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE));
    assert!(should_display(&cfg, info, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION));
}

#[test]
fn test_config_from_renderer_config() {
    let renderer_config = RendererConfig::default()
        .with_debug_severity(DebugSeverity::All)
        .with_debug_output(DebugOutput::Both("validation.log".to_string()))
        .with_panic_on_validation_error(true);

    let cfg = Config::from(&renderer_config);
    assert_eq!(cfg.severity, DebugSeverity::All);
    assert_eq!(cfg.output, DebugOutput::Both("validation.log".to_string()));
    assert!(cfg.panic_on_error);
}
