mod messaging;
mod notifications;
