use std::process::Command;

struct Script {
    name: &'static str,
    about: &'static str,
    /// Extra invocations to document after `--help`
    extra: &'static [&'static str],
}

fn main() {
    let preamble = "Documentation about the scripts contained herein\n";

    let scripts = [Script {
        name: "check-vmware",
        about: "Cross platform, only requires access to a vCenter inventory endpoint. The\n\
                `system_ping_vms` measurement also needs a `ping` binary on the `PATH`.",
        extra: &["--list-checks"],
    }];

    let mut out: String = cp(preamble.split('\n'));
    out.push_str("\n");
    out.push_str(&cp(scripts
        .iter()
        .map(|s| format!("- [{0}](#{0})", s.name))));
    out.push_str("\n");
    for script in &scripts {
        out.push_str(&format!(
            "\
//!
//! # {0}
//!
{1}
",
            script.name,
            cp(script.about.split('\n'))
        ));
        for flag in std::iter::once(&"--help").chain(script.extra.iter()) {
            out.push_str(&format!(
                "\
//!
//! ```plain
//! $ {0} {1}
",
                script.name, flag
            ));
            out.push_str(&cp(run(script.name, flag).split('\n')));
            out.push_str("\n//! ```\n");
        }
    }
    print!("{}", out);
}

fn run(name: &str, flag: &str) -> String {
    let output = Command::new(&format!("target/debug/{}", name))
        .args(&[flag])
        .output()
        .unwrap_or_else(|e| panic!("Couldn't execute command {}: {}", name, e));
    String::from_utf8(output.stdout)
        .unwrap_or_else(|e| panic!("Couldn't convert {} {} output to utf8: {}", name, flag, e))
        .trim_end()
        .to_owned()
}

/// Comment each line in the iterator
fn cp<S: AsRef<str>, I: Iterator<Item = S>>(s: I) -> String {
    s.map(|s| format!("//! {}", s.as_ref()))
        .map(|s| s.trim_end().into())
        .collect::<Vec<String>>()
        .join("\n")
}
