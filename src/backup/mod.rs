pub mod catalog;
pub mod manager;
pub mod mount;
pub mod notifications;
pub mod record;
pub mod result_error;
pub mod retention;
pub mod scheduler;
pub mod settings;
pub mod storage;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
