//! Protected command: list protection rules and test package names.

use bgtrim::protect::{RESERVED_NAME, RESERVED_PREFIX, RESERVED_SUBSTRINGS};
use bgtrim::ProtectionPolicy;

/// One line per tested name: `<name>: protected (<reason>)` or `<name>: killable`.
pub fn describe_names(policy: &ProtectionPolicy, names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| match policy.reason(name) {
            Some(reason) => format!("{}: protected ({})", name, reason),
            None => format!("{}: killable", name),
        })
        .collect()
}

pub fn command_protected(
    policy: &ProtectionPolicy,
    names: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🛡️  Fixed protection rules");
    println!("   equals       \"{}\"", RESERVED_NAME);
    println!("   starts with  \"{}\"", RESERVED_PREFIX);
    for s in RESERVED_SUBSTRINGS {
        println!("   contains     \"{}\"", s);
    }

    if policy.is_empty() {
        println!("\n   (no configured rules)");
    } else {
        println!("\n🛡️  Configured protection rules");
        for n in &policy.names {
            println!("   equals       \"{}\"", n);
        }
        for p in &policy.prefixes {
            println!("   starts with  \"{}\"", p);
        }
        for s in &policy.substrings {
            println!("   contains     \"{}\"", s);
        }
    }

    if !names.is_empty() {
        println!();
        for line in describe_names(policy, names) {
            println!("{}", line);
        }
    }
    Ok(())
}
