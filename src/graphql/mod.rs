pub mod mutations;
pub mod queries;
pub mod schema;
pub mod types;

use async_graphql::Context;

use crate::accounts::Identity;
use crate::error::AppError;
use crate::problems::DynProblemRepository;

pub use schema::{build_schema, BhimdattaSchema};

/// Identity behind a GraphQL request, if its session cookie was valid
#[derive(Clone, Debug, Default)]
pub struct Viewer(pub Option<Identity>);

/// Attach what resolvers need to a request
pub fn with_context(
    request: async_graphql::Request,
    problems: DynProblemRepository,
    viewer: Option<Identity>,
) -> async_graphql::Request {
    request.data(problems).data(Viewer(viewer))
}

pub(crate) fn problems<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a DynProblemRepository> {
    ctx.data::<DynProblemRepository>()
}

/// The signed-in identity, or an unauthenticated error
pub(crate) fn require_viewer<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Identity> {
    use async_graphql::ErrorExtensions;

    ctx.data_opt::<Viewer>()
        .and_then(|viewer| viewer.0.as_ref())
        .ok_or_else(|| AppError::Unauthorized.extend())
}
