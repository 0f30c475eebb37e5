//! User gRPC service implementation.

use crate::deadline::{effective_timeout, grpc_timeout};
use crate::interceptors::InterceptorChain;
use crate::proto::user;
use crate::status::to_status;
use keel_core::{CancelToken, PageRequest, RequestContext, User, UserId};
use keel_service::dto::{CreateUserRequest, UpdateUserRequest};
use keel_service::UserService;
use std::sync::Arc;
use std::time::Duration;
use tonic::{Request, Response, Status};
use tracing::debug;

/// Full method paths, used as the `method` label in logs and metrics.
pub mod methods {
    pub const CREATE_USER: &str = "/keel.user.v1.UserService/CreateUser";
    pub const GET_USER: &str = "/keel.user.v1.UserService/GetUser";
    pub const GET_USER_BY_EMAIL: &str = "/keel.user.v1.UserService/GetUserByEmail";
    pub const LIST_USERS: &str = "/keel.user.v1.UserService/ListUsers";
    pub const UPDATE_USER: &str = "/keel.user.v1.UserService/UpdateUser";
    pub const DELETE_USER: &str = "/keel.user.v1.UserService/DeleteUser";
}

/// User gRPC service implementation.
pub struct UserGrpcService {
    user_service: Arc<dyn UserService>,
    chain: InterceptorChain,
    request_timeout: Option<Duration>,
    shutdown: Option<CancelToken>,
}

impl UserGrpcService {
    /// Creates a new user gRPC service with no server-side deadline.
    #[must_use]
    pub fn new(user_service: Arc<dyn UserService>) -> Self {
        Self {
            user_service,
            chain: InterceptorChain::default(),
            request_timeout: None,
            shutdown: None,
        }
    }

    /// Routes every call through `chain`.
    #[must_use]
    pub fn with_chain(mut self, chain: InterceptorChain) -> Self {
        self.chain = chain;
        self
    }

    /// Caps every request at `timeout`. Zero disables the cap.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    /// Cancels in-flight requests when `token` fires.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancelToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Builds the context a request runs under.
    fn context<T>(&self, request: &Request<T>) -> RequestContext {
        let timeout = effective_timeout(grpc_timeout(request.metadata()), self.request_timeout);
        let ctx = timeout.map_or_else(RequestContext::background, RequestContext::with_timeout);
        match &self.shutdown {
            Some(token) => ctx.with_cancel(token.clone()),
            None => ctx,
        }
    }
}

#[tonic::async_trait]
impl user::user_service_server::UserService for UserGrpcService {
    async fn create_user(
        &self,
        request: Request<user::CreateUserRequest>,
    ) -> Result<Response<user::UserResponse>, Status> {
        let ctx = self.context(&request);
        let req = request.into_inner();

        self.chain
            .call(methods::CREATE_USER, async move {
                debug!(email = %req.email, "gRPC CreateUser");
                let created = self
                    .user_service
                    .create_user(&ctx, CreateUserRequest::new(req.email, req.name))
                    .await
                    .map_err(to_status)?;
                Ok(Response::new(user_response(&created)))
            })
            .await
    }

    async fn get_user(
        &self,
        request: Request<user::GetUserRequest>,
    ) -> Result<Response<user::UserResponse>, Status> {
        let ctx = self.context(&request);
        let id = UserId::new(request.into_inner().id);

        self.chain
            .call(methods::GET_USER, async move {
                debug!(user_id = %id, "gRPC GetUser");
                let found = self
                    .user_service
                    .get_user(&ctx, id)
                    .await
                    .map_err(to_status)?;
                Ok(Response::new(user_response(&found)))
            })
            .await
    }

    async fn get_user_by_email(
        &self,
        request: Request<user::GetUserByEmailRequest>,
    ) -> Result<Response<user::UserResponse>, Status> {
        let ctx = self.context(&request);
        let email = request.into_inner().email;

        self.chain
            .call(methods::GET_USER_BY_EMAIL, async move {
                debug!(email = %email, "gRPC GetUserByEmail");
                let found = self
                    .user_service
                    .get_user_by_email(&ctx, &email)
                    .await
                    .map_err(to_status)?;
                Ok(Response::new(user_response(&found)))
            })
            .await
    }

    async fn list_users(
        &self,
        request: Request<user::ListUsersRequest>,
    ) -> Result<Response<user::ListUsersResponse>, Status> {
        let ctx = self.context(&request);
        let req = request.into_inner();
        let page_request = PageRequest::new(req.page.into(), req.page_size.into());

        self.chain
            .call(methods::LIST_USERS, async move {
                debug!(page = page_request.page, size = page_request.size, "gRPC ListUsers");
                let page = self
                    .user_service
                    .list_users(&ctx, page_request.page.into(), page_request.size.into())
                    .await
                    .map_err(to_status)?;

                Ok(Response::new(user::ListUsersResponse {
                    users: page.items.iter().map(to_proto_user).collect(),
                    total: i32::try_from(page.total).unwrap_or(i32::MAX),
                }))
            })
            .await
    }

    async fn update_user(
        &self,
        request: Request<user::UpdateUserRequest>,
    ) -> Result<Response<user::UserResponse>, Status> {
        let ctx = self.context(&request);
        let req = request.into_inner();
        let id = UserId::new(req.id);

        self.chain
            .call(methods::UPDATE_USER, async move {
                debug!(user_id = %id, "gRPC UpdateUser");
                let updated = self
                    .user_service
                    .update_user(&ctx, id, UpdateUserRequest::new(req.email, req.name))
                    .await
                    .map_err(to_status)?;
                Ok(Response::new(user_response(&updated)))
            })
            .await
    }

    async fn delete_user(
        &self,
        request: Request<user::DeleteUserRequest>,
    ) -> Result<Response<user::Empty>, Status> {
        let ctx = self.context(&request);
        let id = UserId::new(request.into_inner().id);

        self.chain
            .call(methods::DELETE_USER, async move {
                debug!(user_id = %id, "gRPC DeleteUser");
                self.user_service
                    .delete_user(&ctx, id)
                    .await
                    .map_err(to_status)?;
                Ok(Response::new(user::Empty {}))
            })
            .await
    }
}

fn user_response(user: &User) -> user::UserResponse {
    user::UserResponse {
        user: Some(to_proto_user(user)),
    }
}

/// Converts a domain user to its wire form. Timestamps are unix seconds.
#[must_use]
pub fn to_proto_user(user: &User) -> user::User {
    user::User {
        id: user.id.get(),
        email: user.email.clone(),
        name: user.name.clone(),
        created_at: user.created_at.timestamp(),
        updated_at: user.updated_at.timestamp(),
    }
}
