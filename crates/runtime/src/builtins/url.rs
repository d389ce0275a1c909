//! The `url` capability: WHATWG `URL` and `URLSearchParams` globals.
//!
//! Parsing, component setters and form encoding run in the `url` crate;
//! `url.js` wraps them in the script-facing classes.

use rquickjs::function::Opt;
use rquickjs::{Ctx, Exception, Function, Object};
use url::{Url, form_urlencoded, quirks};

const PRELUDE: &str = include_str!("url.js");

pub(super) fn install<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let parse = Function::new(
        ctx.clone(),
        |ctx: Ctx<'js>, input: String, base: Opt<String>| -> rquickjs::Result<Object<'js>> {
            let url = parse_url(&input, base.0.as_deref())
                .map_err(|err| Exception::throw_type(&ctx, &format!("Invalid URL: {err}")))?;
            components(&ctx, &url)
        },
    )?;
    let update = Function::new(
        ctx.clone(),
        |ctx: Ctx<'js>, href: String, component: String, value: String| -> rquickjs::Result<Object<'js>> {
            let mut url =
                Url::parse(&href).map_err(|err| Exception::throw_type(&ctx, &format!("Invalid URL: {err}")))?;
            set_component(&mut url, &component, &value).map_err(|message| Exception::throw_type(&ctx, &message))?;
            components(&ctx, &url)
        },
    )?;
    let form_parse = Function::new(ctx.clone(), |query: String| parse_form(&query))?;
    let form_serialize = Function::new(ctx.clone(), |pairs: Vec<Vec<String>>| serialize_form(&pairs))?;

    let prelude: Function<'js> = ctx.eval(PRELUDE)?;
    prelude.call((parse, update, form_parse, form_serialize))
}

fn parse_url(input: &str, base: Option<&str>) -> Result<Url, url::ParseError> {
    match base {
        Some(base) => {
            let base = Url::parse(base)?;
            Url::options().base_url(Some(&base)).parse(input)
        }
        None => Url::parse(input),
    }
}

fn set_component(url: &mut Url, component: &str, value: &str) -> Result<(), String> {
    // Setters other than `href` ignore invalid input.
    let _ = match component {
        "href" => return quirks::set_href(url, value).map_err(|err| format!("Invalid URL: {err}")),
        "protocol" => quirks::set_protocol(url, value),
        "username" => quirks::set_username(url, value),
        "password" => quirks::set_password(url, value),
        "host" => quirks::set_host(url, value),
        "hostname" => quirks::set_hostname(url, value),
        "port" => quirks::set_port(url, value),
        "pathname" => {
            quirks::set_pathname(url, value);
            Ok(())
        }
        "search" => {
            quirks::set_search(url, value);
            Ok(())
        }
        "hash" => {
            quirks::set_hash(url, value);
            Ok(())
        }
        other => return Err(format!("unknown URL component: {other}")),
    };
    Ok(())
}

fn components<'js>(ctx: &Ctx<'js>, url: &Url) -> rquickjs::Result<Object<'js>> {
    let object = Object::new(ctx.clone())?;
    object.set("href", quirks::href(url))?;
    object.set("origin", quirks::origin(url))?;
    object.set("protocol", quirks::protocol(url))?;
    object.set("username", quirks::username(url))?;
    object.set("password", quirks::password(url))?;
    object.set("host", quirks::host(url))?;
    object.set("hostname", quirks::hostname(url))?;
    object.set("port", quirks::port(url))?;
    object.set("pathname", quirks::pathname(url))?;
    object.set("search", quirks::search(url))?;
    object.set("hash", quirks::hash(url))?;
    Ok(object)
}

fn parse_form(query: &str) -> Vec<Vec<String>> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(name, value)| vec![name.into_owned(), value.into_owned()])
        .collect()
}

fn serialize_form(pairs: &[Vec<String>]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for pair in pairs {
        if let [name, value] = pair.as_slice() {
            serializer.append_pair(name, value);
        }
    }
    serializer.finish()
}
