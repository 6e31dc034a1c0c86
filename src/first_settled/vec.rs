use super::FirstSettled as FirstSettledTrait;
use crate::{Deferred, Resolution};

impl<T: Clone + 'static> FirstSettledTrait for Vec<Resolution<T>> {
    type Output = T;

    fn first_settled(self) -> Deferred<Self::Output> {
        super::first_settled(self)
    }
}
