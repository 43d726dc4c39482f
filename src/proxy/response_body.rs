use http_body_util::Full;
use hyper::body::{Bytes, Frame, Incoming};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

pub enum ResponseBody {
    Empty,
    Fixed(Full<Bytes>),
    Upstream(Incoming),
}

impl ResponseBody {
    pub fn empty() -> Self {
        ResponseBody::Empty
    }

    pub fn fixed(data: Vec<u8>) -> Self {
        let data = Bytes::from(data);
        ResponseBody::Fixed(Full::new(data))
    }
}

impl From<Incoming> for ResponseBody {
    fn from(body: Incoming) -> Self {
        ResponseBody::Upstream(body)
    }
}

impl hyper::body::Body for ResponseBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            ResponseBody::Empty => Poll::Ready(None),
            ResponseBody::Fixed(body) => Pin::new(body).poll_frame(cx).map_err(io::Error::other),
            ResponseBody::Upstream(body) => Pin::new(body).poll_frame(cx).map_err(io::Error::other),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            ResponseBody::Empty => true,
            ResponseBody::Fixed(body) => hyper::body::Body::is_end_stream(body),
            ResponseBody::Upstream(body) => hyper::body::Body::is_end_stream(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_fixed_body_collects() {
        let body = ResponseBody::fixed(b"Unauthorized".to_vec());
        let collected = body.collect().await.unwrap().to_bytes();

        assert_eq!(collected.as_ref(), b"Unauthorized");
    }

    #[tokio::test]
    async fn test_empty_body() {
        let body = ResponseBody::empty();
        assert!(hyper::body::Body::is_end_stream(&body));

        let collected = body.collect().await.unwrap().to_bytes();
        assert!(collected.is_empty());
    }
}
