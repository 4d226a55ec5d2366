use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;
use rpcbench_core::PhaseTracer;

/// Request body that marks the request as written once its last frame is handed over.
#[derive(Debug)]
pub(crate) struct TracedBody {
    inner: Full<Bytes>,
    trace: Option<PhaseTracer>,
}

impl TracedBody {
    pub(crate) fn new(body: Bytes, trace: Option<PhaseTracer>) -> Self {
        Self {
            inner: Full::new(body),
            trace,
        }
    }

    fn mark_written(&mut self) {
        if let Some(trace) = self.trace.take() {
            trace.request_written();
        }
    }
}

impl Body for TracedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(frame) = &polled
            && (frame.is_none() || this.inner.is_end_stream())
        {
            this.mark_written();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
