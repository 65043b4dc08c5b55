use crate::{
    envelope::Envelope,
    types::{FromValue, TypeMismatch, Value},
};
use futures::future::BoxFuture;
use std::{collections::BTreeMap, fmt, future::Future, marker::PhantomData, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

/// How a call fails before or during execution.
///
/// Every variant is rendered into the response envelope's `err` field and
/// sent back to the caller; none of them terminates the connection.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("func {0} not registered")]
    NotRegistered(String),

    #[error("wrong number of arguments: expected {expected}, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("argument {index}: {source}")]
    Argument { index: usize, source: TypeMismatch },

    /// The function's own trailing error.
    #[error("{0}")]
    Failed(String),
}

/// Decodes an argument list into a typed tuple, checking arity and each
/// argument's variant.
pub trait FromArgs: Sized {
    fn from_args(args: Vec<Value>) -> Result<Self, DispatchError>;
}

macro_rules! impl_from_args {
    ($len:literal; $($ty:ident $arg:ident $idx:literal),*) => {
        impl<$($ty),*> FromArgs for ($($ty,)*)
        where
            $($ty: FromValue,)*
        {
            fn from_args(args: Vec<Value>) -> Result<Self, DispatchError> {
                let [$($arg),*]: [Value; $len] =
                    args.try_into().map_err(|args: Vec<Value>| DispatchError::Arity {
                        expected: $len,
                        got: args.len(),
                    })?;
                Ok(($(
                    $ty::from_value($arg)
                        .map_err(|source| DispatchError::Argument { index: $idx, source })?,
                )*))
            }
        }
    };
}

impl_from_args!(0;);
impl_from_args!(1; A a 0);
impl_from_args!(2; A a 0, B b 1);
impl_from_args!(3; A a 0, B b 1, C c 2);
impl_from_args!(4; A a 0, B b 1, C c 2, D d 3);

/// The non-error results of a call, encoded back into values.
pub trait IntoResults {
    fn into_results(self) -> Vec<Value>;
}

impl IntoResults for () {
    fn into_results(self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! impl_into_results_single {
    ($($rust_ty:ty),*) => {
        $(impl IntoResults for $rust_ty {
            fn into_results(self) -> Vec<Value> {
                vec![self.into()]
            }
        })*
    };
}

impl_into_results_single!(Value, bool, i64, f64, String, Vec<u8>);

macro_rules! impl_into_results_tuple {
    ($($ty:ident $val:ident),*) => {
        impl<$($ty),*> IntoResults for ($($ty,)*)
        where
            $($ty: Into<Value>,)*
        {
            fn into_results(self) -> Vec<Value> {
                let ($($val,)*) = self;
                vec![$($val.into()),*]
            }
        }
    };
}

impl_into_results_tuple!(A a);
impl_into_results_tuple!(A a, B b);
impl_into_results_tuple!(A a, B b, C c);
impl_into_results_tuple!(A a, B b, C c, D d);

/// Return-value half of a registered function.
///
/// The last slot of every registrable function is its error: this trait is
/// implemented only for `Result`, so a function that cannot fail its final
/// slot does not typecheck as registrable in the first place.
pub trait IntoReply {
    fn into_reply(self) -> Result<Vec<Value>, DispatchError>;
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoResults,
    E: fmt::Display,
{
    fn into_reply(self) -> Result<Vec<Value>, DispatchError> {
        match self {
            Ok(results) => Ok(results.into_results()),
            Err(err) => Err(DispatchError::Failed(err.to_string())),
        }
    }
}

/// A callable the [`Dispatcher`] can invoke by name.
///
/// Plain async closures get this for free through [`Dispatcher::register`];
/// implement it directly for functions that carry state of their own.
pub trait RpcFunction {
    type Args: FromArgs;
    type Reply: IntoReply;
    type Fut: Future<Output = Self::Reply> + Send;

    fn call(&self, args: Self::Args) -> Self::Fut;
}

/// Adapts a plain `Fn(args...) -> impl Future` to [`RpcFunction`].
pub struct FnRpcFunction<F, Args> {
    function: F,
    _args: PhantomData<fn(Args)>,
}

macro_rules! impl_fn_rpc_function {
    ($($ty:ident $arg:ident),*) => {
        impl<Func, Fut, Reply, $($ty),*> RpcFunction for FnRpcFunction<Func, ($($ty,)*)>
        where
            Func: Fn($($ty),*) -> Fut,
            Fut: Future<Output = Reply> + Send,
            Reply: IntoReply,
            $($ty: FromValue,)*
        {
            type Args = ($($ty,)*);
            type Reply = Reply;
            type Fut = Fut;

            fn call(&self, ($($arg,)*): Self::Args) -> Fut {
                (self.function)($($arg),*)
            }
        }
    };
}

impl_fn_rpc_function!();
impl_fn_rpc_function!(A a);
impl_fn_rpc_function!(A a, B b);
impl_fn_rpc_function!(A a, B b, C c);
impl_fn_rpc_function!(A a, B b, C c, D d);

/// A type-erased version of the main trait, [`RpcFunction`].
trait DynamicRpcFunction: Send + Sync {
    fn call(&self, args: Vec<Value>) -> BoxFuture<'_, Result<Vec<Value>, DispatchError>>;
}

struct TypedRpcFunction<RFn>(RFn);

impl<RFn> DynamicRpcFunction for TypedRpcFunction<RFn>
where
    RFn: RpcFunction + Send + Sync,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'_, Result<Vec<Value>, DispatchError>> {
        Box::pin(async move {
            let args = RFn::Args::from_args(args)?;
            self.0.call(args).await.into_reply()
        })
    }
}

/// A set of named functions that can be called with [`Value`] arguments.
///
/// Names are bound first-wins: registering a name that is already taken is a
/// no-op. There is no way to unregister.
#[derive(Default)]
pub struct Dispatcher {
    functions: BTreeMap<String, Arc<dyn DynamicRpcFunction>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a plain async function or closure.
    pub fn register<Args, F>(&mut self, name: impl Into<String>, function: F)
    where
        FnRpcFunction<F, Args>: RpcFunction + Send + Sync + 'static,
    {
        self.add(
            name,
            FnRpcFunction {
                function,
                _args: PhantomData,
            },
        );
    }

    /// Bind `name` to an [`RpcFunction`] implementation.
    pub fn add<RFn>(&mut self, name: impl Into<String>, rpc_function: RFn)
    where
        RFn: RpcFunction + Send + Sync + 'static,
    {
        self.functions
            .entry(name.into())
            .or_insert_with(|| Arc::new(TypedRpcFunction(rpc_function)));
    }

    /// Look up the request's target and invoke it.
    ///
    /// Always produces a response envelope echoing the request's name; any
    /// failure, from an unknown name to the function's own error, comes back
    /// as the response's `err` string. Results are dropped on error.
    pub async fn execute(&self, request: Envelope) -> Envelope {
        let Envelope { name, args, .. } = request;

        let Some(function) = self.functions.get(&name) else {
            warn!(func = %name, "func not registered");
            let err = DispatchError::NotRegistered(name.clone());
            return Envelope::fault(name, err.to_string());
        };

        debug!(func = %name, "func called");
        match function.call(args).await {
            Ok(results) => Envelope::reply(name, results),
            Err(err) => Envelope::fault(name, err.to_string()),
        }
    }
}
