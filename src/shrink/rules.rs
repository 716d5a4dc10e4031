// Keep-rule text for test-variant shrink passes.
//
// The default block is fixed and versioned: two runs over identical inputs
// must produce byte-identical rule text. A per-variant override file fully
// replaces the default block, never merges with it. The two package
// keep-rules are appended verbatim in both cases, because packaging must
// retain harness and under-test classes even when nothing in the seed
// closure reaches them.

use crate::error::{Result, WeaveError};
use std::path::Path;

/// Bumped whenever the default rule text changes; the text carries it in
/// its header line.
pub const RULES_VERSION: u32 = 2;

const DEFAULT_RULES: &str = "\
# dexweave default shrink rules v2

# Android framework survival
-keep public class * extends android.app.Application
-keep public class * extends android.app.Activity
-keep public class * extends android.app.Service
-keep public class * extends android.content.BroadcastReceiver
-keep public class * extends android.content.ContentProvider
-dontwarn android.**

# Test harness survival
-keep class androidx.test.** { *; }
-keep class org.junit.** { *; }
-keep class junit.** { *; }
-dontwarn androidx.test.**
-dontwarn org.junit.**
-dontwarn junit.**

# Kotlin runtime survival
-keep class kotlin.Metadata { *; }
-keepclassmembers class **$WhenMappings { <fields>; }
-dontwarn kotlin.**
-dontnote kotlin.**

# Attribute preservation
-keepattributes *Annotation*,Signature,InnerClasses,EnclosingMethod
-keepattributes SourceFile,LineNumberTable
-dontobfuscate
";

/// The fixed default rule block.
pub fn default_rules() -> &'static str {
    DEFAULT_RULES
}

/// Keep-rule retaining everything under a package.
pub fn keep_package_rule(package: &str) -> String {
    format!("-keep class {}.** {{ *; }}", package)
}

/// The complete rule text for a test variant's shrink pass: the default
/// block, or the override file's contents when one is supplied, followed
/// by the mandatory keep-rules for the test package and the tested
/// package.
pub fn effective_rules(
    override_path: Option<&Path>,
    test_package: &str,
    tested_package: &str,
) -> Result<String> {
    let base = match override_path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            WeaveError::Configuration(format!(
                "failed to read shrink rule override {}: {}",
                path.display(),
                e
            ))
        })?,
        None => DEFAULT_RULES.to_string(),
    };

    let mut rules = base;
    if !rules.ends_with('\n') {
        rules.push('\n');
    }
    rules.push_str(&keep_package_rule(test_package));
    rules.push('\n');
    rules.push_str(&keep_package_rule(tested_package));
    rules.push('\n');
    Ok(rules)
}
