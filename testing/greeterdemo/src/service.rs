use tonic::{Request, Response, Status};

use crate::pb;

#[derive(Default)]
pub struct GreeterImpl;

#[tonic::async_trait]
impl pb::greeter_server::Greeter for GreeterImpl {
    async fn say_hello(
        &self,
        request: Request<pb::HelloRequest>,
    ) -> Result<Response<pb::HelloReply>, Status> {
        Ok(Response::new(greet(request.into_inner())))
    }

    async fn say_hello_brief(
        &self,
        request: Request<pb::HelloRequest>,
    ) -> Result<Response<pb::HelloReply>, Status> {
        Ok(Response::new(greet(request.into_inner())))
    }

    async fn update_user(
        &self,
        request: Request<pb::UpdateUserRequest>,
    ) -> Result<Response<pb::User>, Status> {
        let user = request
            .into_inner()
            .user
            .ok_or_else(|| Status::invalid_argument("user is required"))?;
        Ok(Response::new(user))
    }

    async fn fail(
        &self,
        _request: Request<pb::FailRequest>,
    ) -> Result<Response<pb::HelloReply>, Status> {
        Err(Status::internal("internal"))
    }
}

fn greet(request: pb::HelloRequest) -> pb::HelloReply {
    let greeting = if request.greeting.is_empty() {
        "Hello".to_string()
    } else {
        request.greeting
    };
    pb::HelloReply {
        message: format!("{greeting} {}", request.name),
    }
}
