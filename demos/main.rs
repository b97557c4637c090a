//! Builds a small application out of independently assembled branches and
//! drives it without a network server.

use arbor::middleware::{self, Authenticate, Authenticator, Next, Recover};
use arbor::{Branch, Context, Outcome, RouterBuilder};
use http::{Method, Request, StatusCode};

#[derive(Clone)]
struct Admin(String);

struct HeaderAuth;

impl Authenticator for HeaderAuth {
    type Identity = Admin;

    fn authenticate(&self, ctx: &Context) -> Option<Admin> {
        ctx.header("x-admin").map(|name| Admin(name.to_owned()))
    }
}

/// Everything the user-management subsystem serves, relative to wherever it
/// gets mounted.
fn users() -> Branch {
    let branch = Branch::new();
    branch.get("/", |ctx: &mut Context| ctx.text(StatusCode::OK, "all users"));
    branch.get("/{id}", |ctx: &mut Context| {
        let id = ctx.param("id").unwrap_or_default().to_owned();
        ctx.text(StatusCode::OK, &format!("user {id}"));
    });
    branch.delete("/{id}", |ctx: &mut Context| {
        let admin = ctx.get::<Admin>().map(|a| a.0.clone()).unwrap_or_default();
        ctx.text(StatusCode::OK, &format!("deleted by {admin}"));
    });
    branch
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let builder = RouterBuilder::new();
    builder.use_middleware(Recover);
    builder.use_middleware(middleware::from_fn(|ctx: &mut Context, next: Next<'_>| {
        next.run(ctx);
        println!("  -> {} {} answered {}", ctx.method(), ctx.path(), ctx.status());
    }));

    let admin = builder.group("/admin")?;
    admin.use_middleware(Authenticate::required(HeaderAuth));
    admin.mount("/users", &users())?;

    let router = builder.finalize()?;

    for route in router.routes() {
        println!("{:<7} {}", route.method, route.path);
    }

    let requests = [
        Request::get("/admin/users/7").header("x-admin", "root").body(Vec::new())?,
        Request::delete("/admin/users/7").body(Vec::new())?,
        Request::delete("/admin/users/7").header("x-admin", "root").body(Vec::new())?,
        Request::post("/admin/users/7").header("x-admin", "root").body(Vec::new())?,
        Request::get("/admin/users").header("x-admin", "root").body(Vec::new())?,
    ];

    for request in requests {
        let mut ctx = Context::with_request(request);
        let outcome = router.dispatch(&mut ctx);
        let body = String::from_utf8_lossy(ctx.response().body()).into_owned();
        println!("{:?}: {}", outcome, body);

        if let Outcome::Redirect(location) = outcome {
            let follow = Request::builder()
                .method(Method::GET)
                .uri(location)
                .header("x-admin", "root")
                .body(Vec::new())?;
            let response = router.serve(follow);
            println!("  followed: {}", String::from_utf8_lossy(response.body()));
        }
    }

    Ok(())
}
