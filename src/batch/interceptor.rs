use super::ChangeRequest;
use crate::entity::TrackedEntity;

/// Rewrites outgoing change operations before transmission.
pub trait ChangeRequestInterceptor: Send {
    /// Called for every built operation; `index` is the entity's bundle position.
    fn get_request(&mut self, request: ChangeRequest, entity: &dyn TrackedEntity, index: usize) -> ChangeRequest;

    /// Called once with the fully assembled operation list.
    fn done(&mut self, requests: &mut Vec<ChangeRequest>);
}

/// Creates one interceptor per save call.
pub trait InterceptorFactory: Send + Sync {
    fn create(&self, bundle_len: usize) -> Box<dyn ChangeRequestInterceptor>;
}

/// Leaves every operation as built.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughInterceptor;

impl ChangeRequestInterceptor for PassThroughInterceptor {
    fn get_request(&mut self, request: ChangeRequest, _entity: &dyn TrackedEntity, _index: usize) -> ChangeRequest {
        request
    }

    fn done(&mut self, _requests: &mut Vec<ChangeRequest>) {}
}

impl InterceptorFactory for PassThroughInterceptor {
    fn create(&self, _bundle_len: usize) -> Box<dyn ChangeRequestInterceptor> {
        Box::new(PassThroughInterceptor)
    }
}
