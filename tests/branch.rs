use arbor::middleware::{self, Next};
use arbor::{Branch, Context, InsertError, Middleware, RouteOptions, Router, RouterBuilder};
use http::{Method, Request, StatusCode};
use parking_lot::Mutex;
use std::sync::Arc;

type Trace = Arc<Mutex<Vec<&'static str>>>;

/// Records its name and continues, unless it is the one told to stop.
fn step(trace: &Trace, name: &'static str, stop: Option<&'static str>) -> impl Middleware {
    let trace = trace.clone();
    middleware::from_fn(move |ctx: &mut Context, next: Next<'_>| {
        trace.lock().push(name);
        if stop == Some(name) {
            ctx.text(StatusCode::FORBIDDEN, name);
            return;
        }
        next.run(ctx);
    })
}

/// root [global] -> A at /a [m1] -> B at /b [m2] -> GET /h [m3]
fn nested(trace: &Trace, stop: Option<&'static str>) -> Router {
    let root = RouterBuilder::new();
    root.use_middleware(step(trace, "global", stop));

    let a = Branch::new();
    a.use_middleware(step(trace, "m1", stop));

    let b = Branch::new();
    b.use_middleware(step(trace, "m2", stop));

    let handler_trace = trace.clone();
    b.add_handler_with(
        Method::GET,
        "/h",
        move |ctx: &mut Context| {
            handler_trace.lock().push("handler");
            ctx.text(StatusCode::OK, "done");
        },
        RouteOptions::new().middleware(step(trace, "m3", stop)),
    );

    a.mount("/b", &b).unwrap();
    root.mount("/a", &a).unwrap();
    root.finalize().unwrap()
}

fn get(router: &Router, uri: &str) -> http::Response<Vec<u8>> {
    router.serve(Request::get(uri).body(Vec::new()).unwrap())
}

#[test]
fn outer_branches_wrap_inner_ones() {
    let trace = Trace::default();
    let router = nested(&trace, None);

    let response = get(&router, "/a/b/h");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*trace.lock(), ["global", "m1", "m2", "m3", "handler"]);
}

#[test]
fn short_circuit_at_every_level() {
    for stop in ["global", "m1", "m2", "m3"] {
        let trace = Trace::default();
        let router = nested(&trace, Some(stop));

        let response = get(&router, "/a/b/h");
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "stopped at {stop}");
        assert_eq!(response.body(), stop.as_bytes());

        let ran = trace.lock().clone();
        assert_eq!(ran.last(), Some(&stop));
        assert!(!ran.contains(&"handler"), "handler ran past {stop}");
    }
}

#[test]
fn after_steps_unwind_in_reverse() {
    let trace = Trace::default();
    let root = RouterBuilder::new();

    for name in ["outer", "inner"] {
        let trace = trace.clone();
        root.use_middleware(middleware::from_fn(move |ctx: &mut Context, next: Next<'_>| {
            next.run(ctx);
            trace.lock().push(name);
        }));
    }
    root.get("/", |_: &mut Context| {});

    let router = root.finalize().unwrap();
    get(&router, "/");
    assert_eq!(*trace.lock(), ["inner", "outer"]);
}

#[test]
fn sibling_middleware_does_not_leak() {
    let trace = Trace::default();
    let root = RouterBuilder::new();

    let left = root.group("/left").unwrap();
    left.use_middleware(step(&trace, "left", None));
    left.get("/x", |_: &mut Context| {});

    let right = root.group("/right").unwrap();
    right.use_middleware(step(&trace, "right", None));
    right.get("/x", |_: &mut Context| {});

    // Registered on the parent: only the parent's middleware applies.
    root.get("/x", |_: &mut Context| {});

    let router = root.finalize().unwrap();

    get(&router, "/left/x");
    assert_eq!(*trace.lock(), ["left"]);

    trace.lock().clear();
    get(&router, "/right/x");
    assert_eq!(*trace.lock(), ["right"]);

    trace.lock().clear();
    get(&router, "/x");
    assert!(trace.lock().is_empty());
}

#[test]
fn registration_order_does_not_matter() {
    let trace = Trace::default();

    // Mount first, add middleware and routes afterwards.
    let root = RouterBuilder::new();
    let child = Branch::new();
    root.mount("/late", &child).unwrap();
    child.get("/r", |_: &mut Context| {});
    child.use_middleware(step(&trace, "child", None));
    root.use_middleware(step(&trace, "root", None));

    let router = root.finalize().unwrap();
    get(&router, "/late/r");
    assert_eq!(*trace.lock(), ["root", "child"]);
}

/// A subsystem built without knowing where it will be mounted.
fn rbac() -> Branch {
    let branch = Branch::new();
    branch.get("/roles", |ctx: &mut Context| {
        let route = ctx.route().unwrap_or_default().to_owned();
        ctx.text(StatusCode::OK, &route);
    });
    branch.get("/roles/{role}", |ctx: &mut Context| {
        let role = ctx.param("role").unwrap_or_default().to_owned();
        ctx.text(StatusCode::OK, &role);
    });
    branch
}

#[test]
fn subsystems_mount_anywhere() {
    let root = RouterBuilder::new();
    root.mount("/admin/rbac", &rbac()).unwrap();
    root.group("/v2")
        .unwrap()
        .mount("/access/", &rbac())
        .unwrap();

    let router = root.finalize().unwrap();

    assert_eq!(get(&router, "/admin/rbac/roles").body(), b"/admin/rbac/roles");
    assert_eq!(get(&router, "/v2/access/roles").body(), b"/v2/access/roles");
    assert_eq!(get(&router, "/v2/access/roles/editor").body(), b"editor");
    assert_eq!(get(&router, "/rbac/roles").status(), StatusCode::NOT_FOUND);
}

#[test]
fn finalized_branches_cannot_be_reused() {
    let shared = rbac();

    let first = RouterBuilder::new();
    first.mount("/one", &shared).unwrap();
    let router = first.finalize().unwrap();
    assert_eq!(router.routes().len(), 2);

    let second = RouterBuilder::new();
    assert_eq!(
        second.mount("/two", &shared),
        Err(InsertError::AlreadyFinalized)
    );

    let router = second.finalize().unwrap();
    assert!(router.routes().is_empty());
}

#[test]
fn kept_group_handles_are_closed_after_finalize() {
    let builder = RouterBuilder::new();
    let api = builder.group("/api").unwrap();
    api.get("/users", |_: &mut Context| {});
    let _router = builder.finalize().unwrap();

    let late = rbac();
    assert_eq!(api.mount("/child", &late), Err(InsertError::AlreadyFinalized));
    assert!(!late.is_mounted());

    let elsewhere = RouterBuilder::new();
    elsewhere.mount("/child", &late).unwrap();
    assert_eq!(elsewhere.finalize().unwrap().routes().len(), 2);

    let registered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        api.get("/late", |_: &mut Context| {});
    }));
    assert!(registered.is_err());
}

#[test]
fn builders_cannot_be_mounted() {
    let builder = RouterBuilder::new();
    builder.get("/h", |ctx: &mut Context| ctx.text(StatusCode::OK, "h"));

    let outer = Branch::new();
    outer.use_middleware(middleware::from_fn(|ctx: &mut Context, _: Next<'_>| {
        ctx.text(StatusCode::FORBIDDEN, "outer");
    }));
    assert_eq!(outer.mount("/outer", &builder), Err(InsertError::RootMount));

    let router = builder.finalize().unwrap();
    assert_eq!(router.routes()[0].path, "/h");
    assert_eq!(get(&router, "/h").body(), b"h");
}

#[test]
fn every_route_is_registered_once() {
    let root = RouterBuilder::new();
    let a = root.group("/a").unwrap();
    let b = a.group("/b").unwrap();
    for branch in [&*root, &a, &b] {
        branch.get("/x", |_: &mut Context| {});
        branch.post("/x", |_: &mut Context| {});
    }

    let router = root.finalize().unwrap();
    let listed = router
        .routes()
        .iter()
        .map(|r| format!("{} {}", r.method, r.path))
        .collect::<Vec<_>>();

    assert_eq!(
        listed,
        [
            "GET /a/b/x",
            "POST /a/b/x",
            "GET /a/x",
            "POST /a/x",
            "GET /x",
            "POST /x",
        ]
    );
}
