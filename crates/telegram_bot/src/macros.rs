//! Registration shorthand used by the command modules.

/// Registers one command in a [`CommandRegistry`](crate::registry::CommandRegistry):
///
/// ```ignore
/// command!(registry, "ping", ping, General, Citizen, "ping", "Check the bot is alive");
/// ```
macro_rules! command {
    ($registry:expr, $name:literal, $handler:path, $category:ident, $role:ident, $usage:literal, $description:literal) => {
        $registry.register($crate::registry::CommandSpec {
            name: $name,
            description: $description,
            usage: $usage,
            category: $crate::registry::Category::$category,
            min_role: ::engine::Role::$role,
            handler: $crate::registry::handler_fn($handler),
        })
    };
}
