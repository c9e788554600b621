//! Service and method descriptors.

use super::{descriptor_handle, DescriptorBase, FileDescriptor, MessageDescriptor, Target};
use crate::options::CustomOptions;
use prost_types::{MethodOptions, ServiceOptions};

#[derive(Debug)]
pub(crate) struct ServiceInner {
    pub(crate) base: DescriptorBase,
    pub(crate) methods: Vec<usize>,
    pub(crate) options: Option<ServiceOptions>,
    pub(crate) custom: Option<CustomOptions>,
}

/// An RPC service
#[derive(Clone)]
pub struct ServiceDescriptor {
    file: FileDescriptor,
    index: usize,
}

descriptor_handle!(ServiceDescriptor, ServiceInner, services);

impl ServiceDescriptor {
    /// Methods in declaration order
    pub fn methods(&self) -> impl ExactSizeIterator<Item = MethodDescriptor> + '_ {
        self.inner()
            .methods
            .iter()
            .map(|&index| MethodDescriptor::new(self.file.clone(), index))
    }

    /// Method with the given name
    pub fn find_method_by_name(&self, name: &str) -> Option<MethodDescriptor> {
        self.methods().find(|method| method.name() == name)
    }

    /// `ServiceOptions` as declared, without custom options
    pub fn options(&self) -> Option<&ServiceOptions> {
        self.inner().options.as_ref()
    }
}

#[derive(Debug)]
pub(crate) struct MethodInner {
    pub(crate) base: DescriptorBase,
    pub(crate) service: usize,
    pub(crate) input_type_name: String,
    pub(crate) output_type_name: String,
    pub(crate) input: Option<Target>,
    pub(crate) output: Option<Target>,
    pub(crate) client_streaming: bool,
    pub(crate) server_streaming: bool,
    pub(crate) options: Option<MethodOptions>,
    pub(crate) custom: Option<CustomOptions>,
}

/// One method of a service
#[derive(Clone)]
pub struct MethodDescriptor {
    file: FileDescriptor,
    index: usize,
}

descriptor_handle!(MethodDescriptor, MethodInner, methods);

impl MethodDescriptor {
    /// Service declaring this method
    pub fn service(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(self.file.clone(), self.inner().service)
    }

    /// Request message type
    pub fn input_type(&self) -> MessageDescriptor {
        self.linked(self.inner().input.as_ref())
    }

    /// Response message type
    pub fn output_type(&self) -> MessageDescriptor {
        self.linked(self.inner().output.as_ref())
    }

    fn linked(&self, target: Option<&Target>) -> MessageDescriptor {
        let (file, index) = target
            .expect("method types are linked during build")
            .resolve(&self.file);
        MessageDescriptor::new(file.clone(), index)
    }

    /// Whether the client sends a stream of requests
    pub fn is_client_streaming(&self) -> bool {
        self.inner().client_streaming
    }

    /// Whether the server sends a stream of responses
    pub fn is_server_streaming(&self) -> bool {
        self.inner().server_streaming
    }

    /// `MethodOptions` as declared, without custom options
    pub fn options(&self) -> Option<&MethodOptions> {
        self.inner().options.as_ref()
    }
}
