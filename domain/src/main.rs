use std::env;
use std::process;

use domain::adapters::memory_repo::InMemoryRepo;
use domain::codegen::RandomCodeGenerator;
use domain::service::LinkService;
use domain::{CoreError, NewLink, OwnerId, ShortCode, SystemClock};

type DemoService = LinkService<InMemoryRepo, RandomCodeGenerator, SystemClock>;

fn usage() -> String {
    format!(
        "{}\n\nUsage:\n  domain create <url> [--code <custom>] [--owner <id>]\n  domain try <url> [--code <custom>] [--owner <id>]\n  domain resolve <code>\n\nNotes:\n  - This demo CLI uses an in-memory repository; data is not persisted across runs.\n  - `resolve` starts from an empty store, so it only reports not found. Use `try`\n    to create a link and follow it in one run.",
        domain::about()
    )
}

fn parse_new_link<I>(mut args: I, cmd: &str) -> Result<NewLink, String>
where
    I: Iterator<Item = String>,
{
    let Some(url) = args.next() else {
        return Err(format!("missing <url> for {}", cmd));
    };
    let mut input = NewLink::new(url);

    // Parse simple flags: --code <val>, --owner <id>
    let rest: Vec<String> = args.collect();
    let mut i = 0;
    while i < rest.len() {
        let Some(val) = rest.get(i + 1) else {
            return Err(format!("{} requires a value", rest[i]));
        };
        match rest[i].as_str() {
            "--code" => input = input.with_custom_code(val.clone()),
            "--owner" => {
                let owner =
                    OwnerId::new(val.clone()).map_err(|e| format!("invalid --owner: {}", e))?;
                input = input.with_owner(owner);
            }
            unk => return Err(format!("unknown argument: {}", unk)),
        }
        i += 2;
    }
    Ok(input)
}

fn resolve(svc: &DemoService, code: &ShortCode) -> Result<String, String> {
    match svc.resolve(code) {
        Ok(url) => Ok(url),
        Err(CoreError::NotFound) => Err(format!("not found: {}", code)),
        Err(e) => Err(format!("resolve failed: {}", e)),
    }
}

/// Run one command and return what it prints on success.
fn run<I>(mut args: I, svc: &DemoService) -> Result<String, String>
where
    I: Iterator<Item = String>,
{
    let Some(cmd) = args.next() else {
        return Ok(usage());
    };

    match cmd.as_str() {
        "create" => {
            let link = svc
                .create(parse_new_link(args, "create")?)
                .map_err(|e| format!("create failed: {}", e))?;
            Ok(format!("created: {} -> {}", link.code, link.target_url))
        }
        "try" => {
            let link = svc
                .create(parse_new_link(args, "try")?)
                .map_err(|e| format!("create failed: {}", e))?;
            let target = resolve(svc, &link.code)?;
            let clicks = svc
                .get(&link.code)
                .map_err(|e| format!("lookup failed: {}", e))?
                .map_or(0, |l| l.clicks);
            Ok(format!(
                "created: {} -> {}\nresolved: {} -> {} (clicks: {})",
                link.code, link.target_url, link.code, target, clicks
            ))
        }
        "resolve" => {
            let Some(code) = args.next() else {
                return Err("missing <code> for resolve".into());
            };
            resolve(svc, &ShortCode::new(code))
        }
        _ => Ok(usage()),
    }
}

fn main() {
    let svc = LinkService::new(
        InMemoryRepo::new(),
        RandomCodeGenerator::default(),
        SystemClock,
    );
    match run(env::args().skip(1), &svc) {
        Ok(out) => println!("{}", out),
        Err(msg) => {
            eprintln!("error: {}", msg);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc() -> DemoService {
        LinkService::new(
            InMemoryRepo::new(),
            RandomCodeGenerator::default(),
            SystemClock,
        )
    }

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn try_creates_then_follows_the_link() {
        let out = run(args(&["try", "example.com/x", "--code", "demo"]), &svc()).unwrap();
        assert_eq!(
            out,
            "created: demo -> http://example.com/x\nresolved: demo -> http://example.com/x (clicks: 1)"
        );
    }

    #[test]
    fn resolve_sees_links_created_on_the_same_service() {
        let svc = svc();
        run(args(&["create", "https://example.com/a", "--code", "a1"]), &svc).unwrap();
        assert_eq!(
            run(args(&["resolve", "a1"]), &svc).unwrap(),
            "https://example.com/a"
        );
        assert_eq!(
            run(args(&["resolve", "nope"]), &svc).unwrap_err(),
            "not found: nope"
        );
    }

    #[test]
    fn bad_arguments_are_reported() {
        let svc = svc();
        assert_eq!(
            run(args(&["create"]), &svc).unwrap_err(),
            "missing <url> for create"
        );
        assert_eq!(
            run(args(&["try", "example.com", "--code"]), &svc).unwrap_err(),
            "--code requires a value"
        );
        assert_eq!(
            run(args(&["create", "example.com", "--bogus", "x"]), &svc).unwrap_err(),
            "unknown argument: --bogus"
        );
        assert!(run(args(&["create", "ftp://x"]), &svc)
            .unwrap_err()
            .starts_with("create failed:"));
    }

    #[test]
    fn usage_mentions_try() {
        let out = run(args(&[]), &svc()).unwrap();
        assert!(out.contains("domain try <url>"));
        assert!(out.contains("starts from an empty store"));
    }
}
