mod model_properties;
mod parser_properties;
mod resolver_properties;
